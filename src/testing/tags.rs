//! Test classification tags

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What a tag says about a test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagType {
    /// How long the test takes
    Runtime,
    /// What kind of test it is
    TestType,
    Misc,
}

impl fmt::Display for TagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TagType::Runtime => "Runtime",
            TagType::TestType => "TestType",
            TagType::Misc => "Misc",
        };
        f.write_str(s)
    }
}

pub const RUNTIME_TAGS: [&str; 3] = ["Short", "Medium", "Long"];

pub const TEST_TYPE_TAGS: [&str; 5] = [
    "FunctionalTest",
    "RegressionTest",
    "EndToEndTest",
    "IntegrationTest",
    "UnitTest",
];

/// Classify a tag name; unknown names are `Misc`
pub fn tag_type(name: &str) -> TagType {
    if RUNTIME_TAGS.iter().any(|t| t.eq_ignore_ascii_case(name)) {
        TagType::Runtime
    } else if TEST_TYPE_TAGS.iter().any(|t| t.eq_ignore_ascii_case(name)) {
        TagType::TestType
    } else {
        TagType::Misc
    }
}

/// A tag as written in a config: a bare name or a name with notes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagSpec {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        info: Option<String>,
    },
}

/// A tag attached to a test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub info: Option<String>,
    pub tag_type: TagType,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let tag_type = tag_type(&name);
        Self {
            name,
            info: None,
            tag_type,
        }
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }
}

impl From<TagSpec> for Tag {
    fn from(spec: TagSpec) -> Self {
        match spec {
            TagSpec::Name(name) => Tag::new(name),
            TagSpec::Detailed { name, info } => Tag {
                info,
                ..Tag::new(name)
            },
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.info {
            Some(info) => write!(f, "{} ({info})", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// How several requested tags combine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagOp {
    /// A test needs at least one of the tags
    #[default]
    Any,
    /// A test needs every tag
    All,
}

impl TagOp {
    /// Whether `declared` satisfies `wanted`; no wanted tags always match
    pub fn matches<D, W>(self, declared: &[D], wanted: &[W]) -> bool
    where
        D: AsRef<str>,
        W: AsRef<str>,
    {
        if wanted.is_empty() {
            return true;
        }
        let has = |w: &W| {
            declared
                .iter()
                .any(|d| d.as_ref().eq_ignore_ascii_case(w.as_ref()))
        };
        match self {
            TagOp::Any => wanted.iter().any(has),
            TagOp::All => wanted.iter().all(has),
        }
    }
}

impl FromStr for TagOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "any" => Ok(TagOp::Any),
            "all" => Ok(TagOp::All),
            other => Err(format!("unknown tag operator '{other}', expected 'any' or 'all'")),
        }
    }
}

impl fmt::Display for TagOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagOp::Any => f.write_str("any"),
            TagOp::All => f.write_str("all"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_types() {
        assert_eq!(Tag::new("Short").tag_type, TagType::Runtime);
        assert_eq!(Tag::new("long").tag_type, TagType::Runtime);
        assert_eq!(Tag::new("UnitTest").tag_type, TagType::TestType);
        assert_eq!(Tag::new("coffee").tag_type, TagType::Misc);
    }

    #[test]
    fn test_tag_specs_deserialize() {
        let specs: Vec<TagSpec> =
            serde_yaml::from_str("- Short\n- name: EndToEndTest\n  info: full flow\n").unwrap();
        let tags: Vec<Tag> = specs.into_iter().map(Tag::from).collect();
        assert_eq!(tags[0], Tag::new("Short"));
        assert_eq!(tags[1], Tag::new("EndToEndTest").with_info("full flow"));
        assert_eq!(tags[1].to_string(), "EndToEndTest (full flow)");
    }

    #[test]
    fn test_tag_op_matches() {
        let declared = ["Short", "EndToEndTest"];
        assert!(TagOp::Any.matches(&declared, &["short", "Long"]));
        assert!(!TagOp::All.matches(&declared, &["short", "Long"]));
        assert!(TagOp::All.matches(&declared, &["SHORT", "endtoendtest"]));
        assert!(TagOp::Any.matches(&declared, &[] as &[&str]));
        assert!(!TagOp::Any.matches(&[] as &[&str], &["Short"]));
    }

    #[test]
    fn test_tag_op_parse() {
        assert_eq!("ALL".parse::<TagOp>(), Ok(TagOp::All));
        assert_eq!("any".parse::<TagOp>(), Ok(TagOp::Any));
        assert!("xor".parse::<TagOp>().is_err());
        assert_eq!(TagOp::default(), TagOp::Any);
    }
}
