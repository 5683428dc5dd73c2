//! Signal match rules: the subject tuple a subscriber watches, and the canonical match-string
//! sent to the bus daemon for it (spec §4.9, §6).

use zbus_names::{BusName, InterfaceName, MemberName};
use zvariant::ObjectPath;

/// A subject tuple identifying which signals a subscriber is interested in. Each field is
/// either a concrete value or a wildcard (`None`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct MatchRule {
    pub sender: Option<BusName<'static>>,
    pub path: Option<ObjectPath<'static>>,
    pub interface: Option<InterfaceName<'static>>,
    pub member: Option<MemberName<'static>>,
}

impl MatchRule {
    pub fn builder() -> MatchRuleBuilder {
        MatchRuleBuilder::default()
    }

    /// Whether an incoming signal's subject matches this rule. Member matching is the caller's
    /// responsibility (a subscriber may additionally filter per-listener member names).
    pub fn matches_subject(
        &self,
        sender: Option<&str>,
        path: Option<&str>,
        interface: Option<&str>,
    ) -> bool {
        field_matches(self.sender.as_ref().map(|b| b.as_str()), sender)
            && field_matches(self.path.as_ref().map(|p| p.as_str()), path)
            && field_matches(self.interface.as_ref().map(|i| i.as_str()), interface)
    }

    /// Render the canonical `type=signal,...` string installed via `AddMatch`/`RemoveMatch`.
    pub fn to_match_string(&self) -> String {
        let mut parts = vec!["type='signal'".to_owned()];
        if let Some(sender) = &self.sender {
            parts.push(format!("sender='{sender}'"));
        }
        if let Some(path) = &self.path {
            parts.push(format!("path='{path}'"));
        }
        if let Some(interface) = &self.interface {
            parts.push(format!("interface='{interface}'"));
        }
        if let Some(member) = &self.member {
            parts.push(format!("member='{member}'"));
        }
        parts.join(",")
    }
}

fn field_matches(rule: Option<&str>, incoming: Option<&str>) -> bool {
    match rule {
        None => true,
        Some(expected) => incoming == Some(expected),
    }
}

#[derive(Default)]
pub struct MatchRuleBuilder {
    rule: MatchRule,
}

impl MatchRuleBuilder {
    pub fn sender(mut self, sender: BusName<'static>) -> Self {
        self.rule.sender = Some(sender);
        self
    }

    pub fn path(mut self, path: ObjectPath<'static>) -> Self {
        self.rule.path = Some(path);
        self
    }

    pub fn interface(mut self, interface: InterfaceName<'static>) -> Self {
        self.rule.interface = Some(interface);
        self
    }

    pub fn member(mut self, member: MemberName<'static>) -> Self {
        self.rule.member = Some(member);
        self
    }

    pub fn build(self) -> MatchRule {
        self.rule
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_canonical_string_with_only_set_fields() {
        let rule = MatchRule::builder()
            .path(ObjectPath::new("/p".to_owned()).unwrap())
            .interface(InterfaceName::new("com.example.I".to_owned()).unwrap())
            .member(MemberName::new("M".to_owned()).unwrap())
            .build();
        assert_eq!(
            rule.to_match_string(),
            "type='signal',path='/p',interface='com.example.I',member='M'"
        );
    }

    #[test]
    fn wildcard_fields_contribute_no_entry() {
        let rule = MatchRule::builder().build();
        assert_eq!(rule.to_match_string(), "type='signal'");
    }

    #[test]
    fn subject_matching_treats_none_as_wildcard() {
        let rule = MatchRule::builder()
            .path(ObjectPath::new("/p".to_owned()).unwrap())
            .build();
        assert!(rule.matches_subject(Some(":1.1"), Some("/p"), Some("any.iface")));
        assert!(!rule.matches_subject(Some(":1.1"), Some("/other"), Some("any.iface")));
    }
}
