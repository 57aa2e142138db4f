//! Slot-based composition of generated module sources
//!
//! The composer takes a [`Skeleton`] and four ordered fragment lists and
//! renders one source unit. Before anything is rendered it checks the
//! structural invariants that keep the unit self-consistent:
//! - every supplied slot exists in the skeleton
//! - each declared variable is declared exactly once, skeleton members included
//! - every variable the setup and per-item code uses is declared
//! - a column name is bound at most once per output table
//!
//! Rendering is a pure function of its inputs.

pub mod emitter;
pub mod scan;
pub mod skeleton;

pub use emitter::SourceEmitter;
pub use skeleton::{Skeleton, Slot, SlotSite};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, trace};

/// Errors detected while composing. None of them leaves partial output.
#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("fragments supplied for slot '{slot}' which is not defined")]
    UnknownSlot { slot: String },

    #[error("variable '{name}' is declared more than once")]
    DuplicateDeclaration { name: String },

    #[error("variable '{name}' used in {slot} is never declared")]
    UnresolvedReference { name: String, slot: Slot },

    #[error("column '{column}' is bound more than once on '{table}'")]
    DuplicateColumn { table: String, column: String },

    #[error("invalid skeleton '{name}': {reason}")]
    InvalidSkeleton { name: String, reason: String },

    #[error("module source '{file}' does not expose entry point '{entry_point}'")]
    MissingEntryPoint { file: String, entry_point: String },

    #[error("template rendering failed: {0}")]
    Template(#[from] tera::Error),
}

/// Fragment lines keyed by slot.
///
/// A slot counts as supplied when it has at least one line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fragments {
    slots: BTreeMap<Slot, Vec<String>>,
}

impl Fragments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the four positional lists.
    pub fn from_lists(
        includes: &[String],
        declarations: &[String],
        setup: &[String],
        per_item: &[String],
    ) -> Self {
        Self::new()
            .with(Slot::Includes, includes.iter().cloned())
            .with(Slot::Declarations, declarations.iter().cloned())
            .with(Slot::Setup, setup.iter().cloned())
            .with(Slot::PerItem, per_item.iter().cloned())
    }

    /// Build from slot names, as read from a fragment file.
    pub fn from_named<I, L>(named: I) -> Result<Self, ComposeError>
    where
        I: IntoIterator<Item = (String, L)>,
        L: IntoIterator<Item = String>,
    {
        let mut fragments = Self::new();
        for (name, lines) in named {
            let slot: Slot = name.parse()?;
            fragments.extend(slot, lines);
        }
        Ok(fragments)
    }

    pub fn with<I, S>(mut self, slot: Slot, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extend(slot, lines);
        self
    }

    /// Append lines to a slot.
    pub fn extend<I, S>(&mut self, slot: Slot, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.slots
            .entry(slot)
            .or_default()
            .extend(lines.into_iter().map(Into::into));
    }

    /// Append everything a [`SourceEmitter`] collected.
    pub fn extend_emitted(&mut self, slot: Slot, emitter: SourceEmitter) {
        self.extend(slot, emitter.into_lines());
    }

    pub fn get(&self, slot: Slot) -> &[String] {
        self.slots.get(&slot).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Slots with at least one line.
    pub fn supplied(&self) -> impl Iterator<Item = Slot> + '_ {
        self.slots
            .iter()
            .filter(|(_, lines)| !lines.is_empty())
            .map(|(slot, _)| *slot)
    }

    pub fn is_empty(&self) -> bool {
        self.supplied().next().is_none()
    }

    /// The subset of slots the skeleton defines.
    pub(crate) fn restricted_to(&self, skeleton: &Skeleton) -> Fragments {
        Fragments {
            slots: self
                .slots
                .iter()
                .filter(|(slot, _)| skeleton.defines(**slot))
                .map(|(slot, lines)| (*slot, lines.clone()))
                .collect(),
        }
    }
}

/// Values a skeleton may reference besides its slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderContext {
    /// Name of the generated module type
    pub module_name: String,
    /// Directory the host writes its trees into
    pub sub_path: String,
    /// File name of the consolidated output
    pub output_name: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self {
            module_name: "Analyzer".to_string(),
            sub_path: "demo".to_string(),
            output_name: "output.root".to_string(),
            extra: BTreeMap::new(),
        }
    }
}

/// Renders skeletons against fragment lists.
///
/// Holds only immutable configuration, so one composer can serve
/// concurrent requests.
#[derive(Debug, Clone, Default)]
pub struct Composer {
    context: RenderContext,
}

impl Composer {
    pub fn new(context: RenderContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    /// Check the invariants, then render.
    pub fn compose(
        &self,
        skeleton: &Skeleton,
        fragments: &Fragments,
    ) -> Result<String, ComposeError> {
        if let Some(slot) = fragments.supplied().find(|slot| !skeleton.defines(*slot)) {
            return Err(ComposeError::UnknownSlot {
                slot: slot.to_string(),
            });
        }

        let includes = dedup_includes(skeleton, fragments.get(Slot::Includes));
        let declared = collect_declarations(skeleton, fragments.get(Slot::Declarations))?;
        check_columns(fragments.get(Slot::Setup))?;

        for slot in [Slot::Setup, Slot::PerItem] {
            let scan = scan::scan_references(fragments.get(slot));
            let is_known = |name: &str| declared.contains(name) || skeleton.is_ambient(name);
            if let Some(name) = scan.unresolved(is_known).next() {
                return Err(ComposeError::UnresolvedReference {
                    name: name.to_string(),
                    slot,
                });
            }
            trace!(%slot, references = scan.references.len(), "References resolved");
        }

        let mut lines: BTreeMap<Slot, Vec<String>> = BTreeMap::new();
        lines.insert(Slot::Includes, includes);
        for slot in [Slot::Declarations, Slot::Setup, Slot::PerItem] {
            lines.insert(slot, fragments.get(slot).to_vec());
        }

        let context = tera::Context::from_serialize(&self.context)?;
        let rendered = skeleton.render_raw(&context, &lines)?;

        debug!(
            skeleton = skeleton.name(),
            declarations = declared.len(),
            bytes = rendered.len(),
            "Rendered skeleton"
        );
        Ok(rendered)
    }
}

/// Render `skeleton` with the four fragment lists and the default context.
pub fn render(
    skeleton: &Skeleton,
    includes: &[String],
    declarations: &[String],
    setup: &[String],
    per_item: &[String],
) -> Result<String, ComposeError> {
    let fragments = Fragments::from_lists(includes, declarations, setup, per_item);
    Composer::default().compose(skeleton, &fragments)
}

/// Trimmed, non-empty include names, first occurrence wins. Headers the
/// skeleton already includes are dropped.
fn dedup_includes(skeleton: &Skeleton, includes: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    includes
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty() && !skeleton.includes(name) && seen.insert(*name))
        .map(str::to_string)
        .collect()
}

fn collect_declarations(
    skeleton: &Skeleton,
    declarations: &[String],
) -> Result<HashSet<String>, ComposeError> {
    let mut declared = HashSet::new();
    for statement in declarations {
        for name in scan::declared_names(statement) {
            if skeleton.declares(&name) || !declared.insert(name.clone()) {
                return Err(ComposeError::DuplicateDeclaration { name });
            }
        }
    }
    Ok(declared)
}

fn check_columns(setup: &[String]) -> Result<(), ComposeError> {
    let mut bound: HashMap<String, HashSet<String>> = HashMap::new();
    for binding in scan::bound_columns(setup) {
        let columns = bound.entry(binding.table.clone()).or_default();
        if !columns.insert(binding.column.clone()) {
            return Err(ComposeError::DuplicateColumn {
                table: binding.table,
                column: binding.column,
            });
        }
    }
    Ok(())
}
