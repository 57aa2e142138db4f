//! Skeleton templates with named insertion points
//!
//! A skeleton is a Tera template. Insertion points are marker lines holding
//! only a Tera comment:
//!
//! ```text
//!    {# slot: per_item #}
//! {# slot: includes => #include "{{ line }}" #}
//! ```
//!
//! Because markers are comments, an unprocessed skeleton is still a valid
//! template in which every insertion point renders empty. At parse time each
//! marker line is rewritten into a loop over the slot's fragment list that
//! reproduces the marker's indentation on every emitted line.

use super::scan;
use super::ComposeError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tera::Tera;

static MARKER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<indent>[ \t]*)\{#-?\s*slot:\s*(?P<name>[A-Za-z_][A-Za-z0-9_]*)\s*(?:=>\s*(?P<body>.*?))?\s*-?#\}\s*$",
    )
    .expect("Valid regex pattern")
});

/// Tera tags, expressions, and comments in skeleton static text
static TERA_SYNTAX_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\{\{.*?\}\}|\{%.*?%\}|\{#.*?#\}").expect("Valid regex pattern")
});

/// `#include "header"` and `#include <header>` directives
static INCLUDE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^[ \t]*#[ \t]*include[ \t]*[<"](?P<header>[^>"]+)[>"]"#)
        .expect("Valid regex pattern")
});

const DEFAULT_LINE_TEMPLATE: &str = "{{ line }}";

/// The four insertion points, in the order they must appear in a skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Includes,
    Declarations,
    Setup,
    PerItem,
}

impl Slot {
    pub const ALL: [Slot; 4] = [
        Slot::Includes,
        Slot::Declarations,
        Slot::Setup,
        Slot::PerItem,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Includes => "includes",
            Slot::Declarations => "declarations",
            Slot::Setup => "setup",
            Slot::PerItem => "per_item",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Slot {
    type Err = ComposeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Slot::ALL
            .into_iter()
            .find(|slot| slot.as_str() == s)
            .ok_or_else(|| ComposeError::UnknownSlot {
                slot: s.to_string(),
            })
    }
}

/// Where an insertion point sits in the skeleton source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSite {
    /// 1-based line number of the marker
    pub line: usize,
    pub indent: String,
    /// Per-fragment line template, `{{ line }}` by default
    pub line_template: String,
}

/// A parsed skeleton, ready to render.
#[derive(Debug, Clone)]
pub struct Skeleton {
    name: String,
    tera: Tera,
    sites: BTreeMap<Slot, SlotSite>,
    ambient: HashSet<String>,
    members: HashSet<String>,
    includes: HashSet<String>,
}

impl Skeleton {
    /// Parse skeleton source. `name` identifies it in errors and is used as
    /// the Tera template name.
    pub fn parse(name: impl Into<String>, source: &str) -> Result<Self, ComposeError> {
        let name = name.into();
        let invalid = |reason: String| ComposeError::InvalidSkeleton {
            name: name.clone(),
            reason,
        };

        let mut sites: BTreeMap<Slot, SlotSite> = BTreeMap::new();
        let mut last: Option<Slot> = None;
        let mut compiled = String::with_capacity(source.len());
        let mut static_text = String::with_capacity(source.len());

        for (idx, raw_line) in source.split_inclusive('\n').enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim_end_matches('\n').trim_end_matches('\r');

            let Some(caps) = MARKER_REGEX.captures(line) else {
                compiled.push_str(raw_line);
                static_text.push_str(raw_line);
                continue;
            };

            let slot_name = &caps["name"];
            let slot: Slot = slot_name.parse().map_err(|_| {
                invalid(format!("unknown slot '{slot_name}' on line {line_no}"))
            })?;
            if let Some(existing) = sites.get(&slot) {
                return Err(invalid(format!(
                    "slot '{slot}' defined on line {} and again on line {line_no}",
                    existing.line
                )));
            }
            if let Some(prev) = last {
                if prev > slot {
                    return Err(invalid(format!(
                        "slot '{slot}' on line {line_no} must come before slot '{prev}'"
                    )));
                }
            }
            last = Some(slot);

            let indent = caps["indent"].to_string();
            let line_template = caps
                .name("body")
                .map(|m| m.as_str().trim())
                .filter(|body| !body.is_empty())
                .unwrap_or(DEFAULT_LINE_TEMPLATE)
                .to_string();
            let eol = if raw_line.ends_with("\r\n") { "\r\n" } else { "\n" };

            compiled.push_str(&format!(
                "{{% for line in slots.{slot} %}}{indent}{line_template}{eol}{{% endfor %}}"
            ));

            sites.insert(
                slot,
                SlotSite {
                    line: line_no,
                    indent,
                    line_template,
                },
            );
        }

        let mut tera = Tera::default();
        tera.autoescape_on(vec![]); // generated code must not be HTML-escaped
        tera.add_raw_template(&name, &compiled)
            .map_err(|e| invalid(format!("invalid template syntax: {e}")))?;

        let without_tera = TERA_SYNTAX_REGEX.replace_all(&static_text, " ");
        let ambient = scan::identifiers(&without_tera);
        let members = scan::declared_in_block(&without_tera);
        let includes = INCLUDE_REGEX
            .captures_iter(&without_tera)
            .map(|cap| cap["header"].trim().to_string())
            .collect();

        tracing::debug!(
            skeleton = %name,
            slots = ?sites.keys().map(Slot::as_str).collect::<Vec<_>>(),
            "Parsed skeleton"
        );

        Ok(Self {
            name,
            tera,
            sites,
            ambient,
            members,
            includes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Slots this skeleton defines, in source order.
    pub fn slots(&self) -> impl Iterator<Item = Slot> + '_ {
        self.sites.keys().copied()
    }

    pub fn defines(&self, slot: Slot) -> bool {
        self.sites.contains_key(&slot)
    }

    pub fn site(&self, slot: Slot) -> Option<&SlotSite> {
        self.sites.get(&slot)
    }

    /// Is `name` an identifier that already appears in the skeleton's own
    /// code (a member it declares, a parameter, a namespace)?
    pub fn is_ambient(&self, name: &str) -> bool {
        self.ambient.contains(name)
    }

    /// Does the skeleton's own code declare a variable called `name`?
    pub fn declares(&self, name: &str) -> bool {
        self.members.contains(name)
    }

    /// Does the skeleton already include `header`, with either quote style?
    pub fn includes(&self, header: &str) -> bool {
        self.includes.contains(header)
    }

    /// Render with the given context values and per-slot lines.
    ///
    /// Slots missing from `lines` render empty. No structural checks happen
    /// here; see [`super::Composer`].
    pub(crate) fn render_raw(
        &self,
        context: &tera::Context,
        lines: &BTreeMap<Slot, Vec<String>>,
    ) -> Result<String, ComposeError> {
        let empty: &[String] = &[];
        let slots: BTreeMap<&str, &[String]> = Slot::ALL
            .iter()
            .map(|slot| {
                (
                    slot.as_str(),
                    lines.get(slot).map(Vec::as_slice).unwrap_or(empty),
                )
            })
            .collect();

        let mut context = context.clone();
        context.insert("slots", &slots);
        Ok(self.tera.render(&self.name, &context)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = "head\n{# slot: includes => #include \"{{ line }}\" #}\nclass X {\n  {# slot: declarations #}\n};\n";

    #[test]
    fn test_parse_records_sites() {
        let skeleton = Skeleton::parse("simple", SIMPLE).unwrap();
        assert_eq!(
            skeleton.slots().collect::<Vec<_>>(),
            vec![Slot::Includes, Slot::Declarations]
        );

        let includes = skeleton.site(Slot::Includes).unwrap();
        assert_eq!(includes.line, 2);
        assert_eq!(includes.indent, "");
        assert_eq!(includes.line_template, "#include \"{{ line }}\"");

        let decls = skeleton.site(Slot::Declarations).unwrap();
        assert_eq!(decls.indent, "  ");
        assert_eq!(decls.line_template, "{{ line }}");
        assert!(!skeleton.defines(Slot::Setup));
    }

    #[test]
    fn test_parse_rejects_unknown_slot() {
        let err = Skeleton::parse("bad", "{# slot: teardown #}\n").unwrap_err();
        assert!(matches!(err, ComposeError::InvalidSkeleton { .. }));
        assert!(err.to_string().contains("teardown"));
    }

    #[test]
    fn test_parse_rejects_duplicate_slot() {
        let src = "{# slot: setup #}\n{# slot: setup #}\n";
        let err = Skeleton::parse("dup", src).unwrap_err();
        assert!(err.to_string().contains("again on line 2"));
    }

    #[test]
    fn test_parse_rejects_out_of_order_slots() {
        let src = "{# slot: per_item #}\n{# slot: setup #}\n";
        let err = Skeleton::parse("order", src).unwrap_err();
        assert!(matches!(err, ComposeError::InvalidSkeleton { .. }));
        assert!(err.to_string().contains("must come before"));
    }

    #[test]
    fn test_plain_comments_are_not_markers() {
        let skeleton = Skeleton::parse("plain", "{# just a note #}\nx\n").unwrap();
        assert_eq!(skeleton.slots().count(), 0);
    }

    #[test]
    fn test_ambient_identifiers_skip_comments_and_tera() {
        let src = "// hidden\nTTree *myTree; {{ module_name }}\n{# slot: setup #}\n";
        let skeleton = Skeleton::parse("ambient", src).unwrap();
        assert!(skeleton.is_ambient("myTree"));
        assert!(skeleton.is_ambient("TTree"));
        assert!(!skeleton.is_ambient("hidden"));
        assert!(!skeleton.is_ambient("module_name"));
    }

    #[test]
    fn test_members_and_includes_of_static_text() {
        let src = "#include <memory>\n#include \"TTree.h\"\n{# slot: includes => #include \"{{ line }}\" #}\n\
                   class {{ module_name }} {\n   void analyze(int);\n   TTree *myTree;\n};\n";
        let skeleton = Skeleton::parse("members", src).unwrap();
        assert!(skeleton.declares("myTree"));
        assert!(!skeleton.declares("analyze"));
        assert!(skeleton.includes("memory"));
        assert!(skeleton.includes("TTree.h"));
        assert!(!skeleton.includes("line"));
    }

    #[test]
    fn test_slot_from_str() {
        assert_eq!("per_item".parse::<Slot>().unwrap(), Slot::PerItem);
        assert!(matches!(
            "body".parse::<Slot>(),
            Err(ComposeError::UnknownSlot { .. })
        ));
    }
}
