//! Harvest orchestration
//!
//! Drives one full run against a live runtime:
//!
//! 1. enumerate the builtin and local namespaces (locals shadow builtins)
//! 2. record classes with their members, free callables and plain values,
//!    growing the type catalog along the way
//! 3. freeze the catalog, build dummy instances, probe every operator
//! 4. assemble and validate the knowledge base
//!
//! Nothing in a run is fatal except failing to start the sandbox or an
//! internally inconsistent document.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, info_span};

use crate::catalog::{FrozenCatalog, TypeCatalog};
use crate::config::ProbeConfig;
use crate::error::Result;
use crate::extract::{self, Binding, Strategy};
use crate::kb::{Funcs, KnowledgeBase};
use crate::members::{self, MemberKind};
use crate::probe::{build_dummies, probe_operators};
use crate::runtime::sandbox::Sandbox;
use crate::runtime::{Item, Runtime};

/// Counters for the namespace phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestStats {
    pub classes: usize,
    pub functions: usize,
    pub values: usize,
    pub members: usize,
    pub excluded: usize,
    /// Excluded type names met in annotations, data members or values.
    pub excluded_types: usize,
    pub shadowed: usize,
    /// Callables (members included) per extraction strategy.
    pub strategies: HashMap<Strategy, usize>,
}

impl HarvestStats {
    fn record(&mut self, strategy: Strategy) {
        *self.strategies.entry(strategy).or_default() += 1;
    }

    pub fn by_strategy(&self, strategy: Strategy) -> usize {
        self.strategies.get(&strategy).copied().unwrap_or(0)
    }
}

/// Result of the namespace phase, before probing.
pub struct Collected {
    pub catalog: TypeCatalog,
    pub funcs: Funcs,
    pub stats: HarvestStats,
}

pub struct Harvester<R: Runtime> {
    runtime: Arc<R>,
    config: ProbeConfig,
}

impl<R: Runtime> Harvester<R> {
    pub fn new(runtime: Arc<R>, config: ProbeConfig) -> Self {
        Harvester { runtime, config }
    }

    /// Run every phase and return the validated knowledge base.
    pub fn run(&self) -> Result<KnowledgeBase> {
        let Collected { catalog, funcs, stats } = self.collect();
        info!(
            types = catalog.len(),
            classes = stats.classes,
            functions = stats.functions,
            values = stats.values,
            members = stats.members,
            excluded = stats.excluded,
            excluded_types = stats.excluded_types,
            "namespaces harvested"
        );
        info!(
            structured = stats.by_strategy(Strategy::Structured),
            text = stats.by_strategy(Strategy::TextSignature),
            doc = stats.by_strategy(Strategy::Doc),
            default = stats.by_strategy(Strategy::Default),
            "signature strategies"
        );

        let catalog = catalog.freeze();
        let tables = {
            let _span = info_span!("probe", types = catalog.len()).entered();
            let mut sandbox = Sandbox::spawn(Arc::clone(&self.runtime), self.config.probe_timeout())?
                .with_worker_limit(self.config.worker_limit);
            let dummies = build_dummies(&mut sandbox, &catalog);
            let untestable: Vec<&str> = dummies
                .unavailable()
                .filter_map(|index| catalog.resolve(index))
                .collect();
            info!(
                available = dummies.available(),
                untestable = untestable.len(),
                "dummy instances built"
            );
            debug!(types = ?untestable, "untestable types");

            let tables = probe_operators(
                &mut sandbox,
                &catalog,
                &dummies,
                &self.config.binary_ops,
                &self.config.unary_ops,
            );
            let sandbox_stats = sandbox.stats();
            if sandbox_stats.restarts > 0 {
                info!(restarts = sandbox_stats.restarts, "sandbox workers replaced");
            }
            tables
        };

        KnowledgeBase::assemble(catalog, funcs, tables)
    }

    /// Namespace phase only: the catalog every later phase would use.
    pub fn catalog(&self) -> FrozenCatalog {
        self.collect().catalog.freeze()
    }

    /// Walk the namespaces, growing a fresh catalog.
    pub fn collect(&self) -> Collected {
        let runtime = &*self.runtime;
        let exclusions = self.config.exclusions();
        let mut catalog = TypeCatalog::excluding(exclusions.clone());
        let mut funcs = Funcs::new(self.config.layout);
        let mut stats = HarvestStats::default();

        for (name, item) in self.namespace(&mut stats) {
            if exclusions.is_excluded(&name) {
                debug!(name = %name, "name excluded");
                stats.excluded += 1;
                continue;
            }
            match item {
                Item::Class(class) => {
                    let index = catalog.intern(&name);
                    let members = members::walk_class(runtime, &mut catalog, &class, &name, &exclusions);
                    for member in &members {
                        if let MemberKind::Callable { strategy, .. } = &member.kind {
                            stats.record(*strategy);
                        }
                    }
                    stats.classes += 1;
                    stats.members += members.len();
                    funcs.add_class(index, &name, &members);
                }
                Item::Function(function) => {
                    let out = extract::extract(runtime, &mut catalog, &function, None, Binding::Static);
                    stats.record(out.strategy);
                    stats.functions += 1;
                    funcs.add_function(&name, out.record);
                }
                Item::Value { type_name } => {
                    let index = catalog.intern(&type_name);
                    stats.values += 1;
                    funcs.add_value(&name, index);
                }
            }
        }

        stats.excluded_types = catalog.denied();
        Collected { catalog, funcs, stats }
    }

    /// Builtins in order, then locals; a local rebinding a builtin name takes
    /// the builtin's place.
    fn namespace(&self, stats: &mut HarvestStats) -> Vec<(String, Item<R>)> {
        let mut entries = if self.config.include_builtins {
            self.runtime.builtins()
        } else {
            Vec::new()
        };
        if self.config.include_locals {
            for (name, item) in self.runtime.locals() {
                match entries.iter_mut().find(|(existing, _)| *existing == name) {
                    Some(slot) => {
                        debug!(name = %name, "local shadows builtin");
                        stats.shadowed += 1;
                        slot.1 = item;
                    }
                    None => entries.push((name, item)),
                }
            }
        }
        entries
    }
}
