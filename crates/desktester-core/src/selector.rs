//! Short-form locator syntax
//!
//! Syntax:
//!   id:btnOK                      - accessibility identifier
//!   role:button AND title:OK      - role + title/value/label equality
//!   role:button AND label:Close   - role + label equality
//!   text:Welcome                  - substring of title/value/label
//!   path:window[0]/button[1]      - hierarchical path
//!   at:120,340                    - element containing the point
//!   index:2 / timeout:1.5         - modifiers for any of the above
//!   id:btnOK OR title:OK          - fallback chain, tried left to right

use crate::error::{Error, Result};
use crate::locator::{LocatorStrategy, LocatorType, DEFAULT_TIMEOUT_SECS, MAX_CHAIN_LEN};
use std::fmt;
use std::str::FromStr;

impl FromStr for LocatorStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::invalid_locator(s, "empty locator"));
        }

        let links: Vec<&str> = s.split(" OR ").collect();
        if links.len() > MAX_CHAIN_LEN {
            return Err(Error::invalid_locator(
                s,
                &format!("fallback chain longer than {} links", MAX_CHAIN_LEN),
            ));
        }

        let mut chain: Option<LocatorStrategy> = None;
        for link in links.iter().rev() {
            let mut loc = parse_link(link.trim())?;
            loc.fallback = chain.map(Box::new);
            chain = Some(loc);
        }
        let loc = chain.ok_or_else(|| Error::invalid_locator(s, "empty locator"))?;
        loc.validate()?;
        Ok(loc)
    }
}

fn parse_link(s: &str) -> Result<LocatorStrategy> {
    let mut primary: Option<(LocatorType, String)> = None;
    let mut role = None;
    let mut index = None;
    let mut timeout = DEFAULT_TIMEOUT_SECS;

    for part in s.split(" AND ") {
        let part = part.trim();
        let (attr, value) = part
            .split_once(':')
            .ok_or_else(|| Error::invalid_locator(part, "expected format 'attr:value'"))?;
        let value = value.trim().to_string();

        let kind = match attr.trim().to_lowercase().as_str() {
            "id" | "identifier" => LocatorType::AccessibilityId,
            "title" | "name" => LocatorType::RoleTitle,
            "label" | "desc" | "description" => LocatorType::RoleLabel,
            "text" => LocatorType::TextContent,
            "path" => LocatorType::Path,
            "at" | "point" | "coord" => LocatorType::Coordinate,
            "role" => {
                role = Some(value);
                continue;
            }
            "index" | "idx" => {
                index = Some(value.parse::<usize>().map_err(|_| {
                    Error::invalid_locator(part, "index must be a non-negative integer")
                })?);
                continue;
            }
            "timeout" => {
                timeout = value
                    .parse::<f64>()
                    .map_err(|_| Error::invalid_locator(part, "timeout must be seconds"))?;
                continue;
            }
            other => {
                return Err(Error::invalid_locator(
                    part,
                    &format!("unknown attribute '{}'", other),
                ))
            }
        };

        if primary.is_some() {
            return Err(Error::invalid_locator(s, "more than one of id/title/label/text/path/at"));
        }
        primary = Some((kind, value));
    }

    let (kind, value) = primary.ok_or_else(|| {
        Error::invalid_locator(s, "needs one of id/title/label/text/path/at")
    })?;
    let mut loc = LocatorStrategy::new(kind, value).with_timeout(timeout);
    loc.role = role;
    loc.index = index;
    Ok(loc)
}

fn attr_name(kind: LocatorType) -> &'static str {
    match kind {
        LocatorType::AccessibilityId => "id",
        LocatorType::RoleTitle => "title",
        LocatorType::RoleLabel => "label",
        LocatorType::TextContent => "text",
        LocatorType::Path => "path",
        LocatorType::Coordinate => "at",
    }
}

impl fmt::Display for LocatorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for link in self.chain() {
            if !first {
                f.write_str(" OR ")?;
            }
            first = false;
            if let Some(role) = &link.role {
                write!(f, "role:{} AND ", role)?;
            }
            write!(f, "{}:{}", attr_name(link.locator_type), link.value)?;
            if let Some(index) = link.index {
                write!(f, " AND index:{}", index)?;
            }
            if (link.timeout - DEFAULT_TIMEOUT_SECS).abs() >= f64::EPSILON {
                write!(f, " AND timeout:{}", link.timeout)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple() {
        let loc: LocatorStrategy = "id:btnOK".parse().unwrap();
        assert_eq!(loc.locator_type, LocatorType::AccessibilityId);
        assert_eq!(loc.value, "btnOK");
        assert!(loc.fallback.is_none());
    }

    #[test]
    fn parse_compound() {
        let loc: LocatorStrategy = "role:button AND title:Submit AND index:1 AND timeout:2"
            .parse()
            .unwrap();
        assert_eq!(loc.locator_type, LocatorType::RoleTitle);
        assert_eq!(loc.role.as_deref(), Some("button"));
        assert_eq!(loc.index, Some(1));
        assert_eq!(loc.timeout, 2.0);
    }

    #[test]
    fn parse_fallback_chain() {
        let loc: LocatorStrategy = "id:btnOK OR role:button AND title:OK OR at:10,20"
            .parse()
            .unwrap();
        let kinds: Vec<_> = loc.chain().map(|l| l.locator_type).collect();
        assert_eq!(
            kinds,
            vec![LocatorType::AccessibilityId, LocatorType::RoleTitle, LocatorType::Coordinate]
        );
    }

    #[test]
    fn display_roundtrips() {
        let src = "id:btnOK OR role:button AND title:OK AND timeout:1.5 OR at:10,20";
        let loc: LocatorStrategy = src.parse().unwrap();
        assert_eq!(loc.to_string(), src);
    }

    #[test]
    fn rejects_bad_input() {
        assert!("".parse::<LocatorStrategy>().is_err());
        assert!("role:button".parse::<LocatorStrategy>().is_err());
        assert!("id:a AND title:b".parse::<LocatorStrategy>().is_err());
        assert!("colour:red".parse::<LocatorStrategy>().is_err());
        assert!("at:ten,twenty".parse::<LocatorStrategy>().is_err());
        assert!("index:x AND id:a".parse::<LocatorStrategy>().is_err());
    }
}
