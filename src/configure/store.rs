/*!
 * Configuration Store
 * Compiled per-tenant configuration, published through atomic swaps
 *
 * A `Configure` is built once from a `RawConfigure` and never mutated after
 * publication. Readers take an `Arc` snapshot of the whole table, so a
 * concurrent swap is observed either entirely or not at all.
 */

use super::observation::ObservationConfigure;
use super::raw::RawConfigure;
use crate::core::errors::ConfigureError;
use crate::core::sync::RcuCell;
use crate::core::types::{ConfigureId, Nanos};
use crate::event::EventWhat;
use crate::reaction::{PrerequisiteSnapshots, Reaction};
use ahash::RandomState;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Compiled tenant configuration
#[derive(Debug)]
pub struct Configure {
    reactions: HashMap<String, Arc<Reaction>, RandomState>,
    observations: Option<HashMap<String, ObservationConfigure, RandomState>>,
    /// event name -> reactions whose tree it can advance
    index: HashMap<String, Vec<Arc<Reaction>>, RandomState>,
    fallback: ObservationConfigure,
}

impl Configure {
    /// Configuration with no reactions and no observation rules
    pub fn empty() -> Self {
        Self {
            reactions: HashMap::default(),
            observations: None,
            index: HashMap::default(),
            fallback: ObservationConfigure::default_rule(),
        }
    }

    pub fn compile(raw: &RawConfigure) -> Result<Self, ConfigureError> {
        let mut reactions: HashMap<String, Arc<Reaction>, RandomState> = HashMap::default();
        let mut index: HashMap<String, Vec<Arc<Reaction>>, RandomState> = HashMap::default();

        // BTreeMap order keeps dependents lists deterministic
        for (name, raw_reaction) in &raw.reactions {
            let reaction = Arc::new(Reaction::compile(name.clone(), raw_reaction)?);
            for watched in reaction.tree().watched_names() {
                index
                    .entry(watched.to_string())
                    .or_default()
                    .push(Arc::clone(&reaction));
            }
            reactions.insert(name.clone(), reaction);
        }

        let observations = raw.observations.as_ref().map(|rules| {
            rules
                .iter()
                .map(|(name, rule)| (name.clone(), rule.clone()))
                .collect::<HashMap<_, _, RandomState>>()
        });

        Ok(Self {
            reactions,
            observations,
            index,
            fallback: ObservationConfigure::default_rule(),
        })
    }

    /// Rule for `name`; no rule means nothing to render
    pub fn observation(&self, name: &str) -> Option<&ObservationConfigure> {
        self.observations.as_ref()?.get(name)
    }

    /// Rule for `name`, or the default single log rule when the tenant
    /// declares no observation rules at all
    pub fn observation_or_default(&self, name: &str) -> Option<&ObservationConfigure> {
        match &self.observations {
            None => Some(&self.fallback),
            Some(rules) => rules.get(name),
        }
    }

    pub fn reaction(&self, name: &str) -> Option<&Arc<Reaction>> {
        self.reactions.get(name)
    }

    pub fn reaction_count(&self) -> usize {
        self.reactions.len()
    }

    /// Reactions whose tree watches `name`
    pub fn dependents(&self, name: &str) -> &[Arc<Reaction>] {
        self.index.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Fresh snapshot for every reaction
    pub fn initialize_snapshots(&self) -> PrerequisiteSnapshots {
        let mut snapshots = PrerequisiteSnapshots::new();
        for (name, reaction) in &self.reactions {
            snapshots.insert(name.clone(), reaction.tree().initialize_snapshot());
        }
        snapshots
    }

    /// Record `name` in every dependent reaction's snapshot
    ///
    /// Snapshots are created on first use. Returns the number of leaf
    /// counters that moved.
    pub fn update_snapshots(
        &self,
        name: &str,
        when: Nanos,
        what: &EventWhat,
        snapshots: &mut PrerequisiteSnapshots,
    ) -> usize {
        self.dependents(name)
            .iter()
            .map(|reaction| {
                let tree = reaction.tree();
                let snapshot = snapshots.get_or_insert_with(reaction.name(), || tree.initialize_snapshot());
                tree.update_snapshot(name, when, what, snapshot)
            })
            .sum()
    }

    /// Same as [`update_snapshots`](Self::update_snapshots) on both the chain
    /// snapshots and the offset snapshots
    pub fn update_both_snapshots(
        &self,
        name: &str,
        when: Nanos,
        what: &EventWhat,
        snapshots: &mut PrerequisiteSnapshots,
        offset: &mut PrerequisiteSnapshots,
    ) -> usize {
        let bumped = self.update_snapshots(name, when, what, snapshots);
        self.update_snapshots(name, when, what, offset);
        bumped
    }

    /// Dependents of `name` whose tree is satisfied by `snapshots`
    pub fn satisfied(&self, name: &str, snapshots: &PrerequisiteSnapshots) -> Vec<Arc<Reaction>> {
        self.dependents(name)
            .iter()
            .filter(|reaction| match reaction.check(snapshots) {
                Ok(satisfied) => satisfied,
                Err(e) => {
                    warn!(reaction = reaction.name(), error = %e, "Prerequisite check failed");
                    false
                }
            })
            .cloned()
            .collect()
    }
}

impl Default for Configure {
    fn default() -> Self {
        Self::empty()
    }
}

type TenantTable = HashMap<ConfigureId, Arc<Configure>, RandomState>;

/// Per-tenant configuration store
///
/// Writers compile outside the swap; readers never block.
#[derive(Clone)]
pub struct ConfigureStore {
    default: RcuCell<Option<Arc<Configure>>>,
    tenants: RcuCell<TenantTable>,
    empty: Arc<Configure>,
}

impl ConfigureStore {
    pub fn new() -> Self {
        Self {
            default: RcuCell::new(None),
            tenants: RcuCell::new(HashMap::default()),
            empty: Arc::new(Configure::empty()),
        }
    }

    /// Compile and publish `raw` for tenant `id`
    ///
    /// `ConfigureId::DEFAULT` replaces the default configuration.
    pub fn set_configure(&self, id: ConfigureId, raw: &RawConfigure) -> Result<(), ConfigureError> {
        if id == ConfigureId::DEFAULT {
            return self.set_default(raw);
        }

        let compiled = Arc::new(Configure::compile(raw)?);
        self.tenants.update(|tenants| {
            let mut next = tenants.clone();
            next.insert(id, Arc::clone(&compiled));
            next
        });

        info!(
            configure_id = %id,
            reactions = compiled.reaction_count(),
            "Configuration published"
        );
        Ok(())
    }

    pub fn set_default(&self, raw: &RawConfigure) -> Result<(), ConfigureError> {
        let compiled = Arc::new(Configure::compile(raw)?);
        let reactions = compiled.reaction_count();
        self.default.store(Some(compiled));

        info!(reactions, "Default configuration published");
        Ok(())
    }

    /// Drop tenant `id`; it falls back to the default afterwards
    pub fn remove_configure(&self, id: ConfigureId) -> bool {
        if !self.tenants.load().contains_key(&id) {
            return false;
        }
        self.tenants.update(|tenants| {
            let mut next = tenants.clone();
            next.remove(&id);
            next
        });
        true
    }

    /// Tenant configuration, else the default, else an empty one
    pub fn get_configure(&self, id: ConfigureId) -> Arc<Configure> {
        if let Some(cfg) = self.tenants.load().get(&id) {
            return Arc::clone(cfg);
        }
        match self.default.load().as_ref() {
            Some(cfg) => Arc::clone(cfg),
            None => Arc::clone(&self.empty),
        }
    }

    /// Whether `id` has its own configuration
    pub fn contains(&self, id: ConfigureId) -> bool {
        self.tenants.load().contains_key(&id)
    }
}

impl Default for ConfigureStore {
    fn default() -> Self {
        Self::new()
    }
}
