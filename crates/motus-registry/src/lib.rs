//! Node template registry and simulated backend for motus patches.
//!
//! This crate is the single place that knows which synthesis-module templates
//! exist. Patches reference templates by type key (`"filter"`, `"lfo"`); the
//! sanitizer, the patch editor and the engine all resolve those keys through a
//! [`TemplateRegistry`].
//!
//! # Features
//!
//! - **Template Discovery**: List all available templates with metadata
//! - **Parameter Schema**: Every template carries its [`ParamDescriptor`]s
//! - **Category System**: Templates organized by role (source, filter, modulator, ...)
//! - **Simulated Backend**: [`SimBackend`] builds units for any template, for offline
//!   evaluation and tests
//!
//! # Example
//!
//! ```rust
//! use motus_registry::{TemplateCategory, TemplateRegistry};
//!
//! let registry = TemplateRegistry::new();
//!
//! for template in registry.all_templates() {
//!     println!("{}: {}", template.id, template.description);
//! }
//!
//! let cutoff = registry.param("filter", "cutoff").unwrap();
//! assert_eq!(cutoff.max, 20000.0);
//!
//! assert!(registry.is_modulator("lfo"));
//! assert_eq!(registry.templates_in_category(TemplateCategory::Modulator).len(), 2);
//! ```

pub mod sim;
pub mod template;

pub use sim::{SimBackend, SimLedger, SimModulator, SimUnit};
pub use template::{NodeTemplate, TemplateCategory};

use motus_core::ParamDescriptor;

use sim::UnitFactory;

/// Reserved node id of the audio output sink. Edges may end here without a node.
pub const SINK_ID: &str = "out";

/// Describes a template in the registry.
#[derive(Debug, Clone)]
pub struct TemplateDescriptor {
    /// Type key used in patch documents.
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Brief description of the template.
    pub description: &'static str,
    /// Category for organization.
    pub category: TemplateCategory,
    /// Whether nodes of this template produce modulation.
    pub modulator: bool,
    /// The template variant.
    pub template: NodeTemplate,
    /// Declared parameters.
    pub params: &'static [ParamDescriptor],
}

impl From<NodeTemplate> for TemplateDescriptor {
    fn from(template: NodeTemplate) -> Self {
        Self {
            id: template.id(),
            name: template.name(),
            description: template.description(),
            category: template.category(),
            modulator: template.is_modulator(),
            template,
            params: template.params(),
        }
    }
}

/// Internal entry in the registry.
struct RegistryEntry {
    descriptor: TemplateDescriptor,
    factory: UnitFactory,
}

/// Registry of all available node templates.
///
/// All built-in templates are registered on construction.
pub struct TemplateRegistry {
    entries: Vec<RegistryEntry>,
}

impl std::fmt::Debug for TemplateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| e.descriptor.id))
            .finish()
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRegistry {
    /// Create a new registry with all built-in templates registered.
    pub fn new() -> Self {
        let mut registry = Self {
            entries: Vec::with_capacity(NodeTemplate::ALL.len()),
        };
        for template in NodeTemplate::ALL {
            registry.register(template.into(), sim::factory_for(template));
        }
        registry
    }

    fn register(&mut self, descriptor: TemplateDescriptor, factory: UnitFactory) {
        self.entries.push(RegistryEntry {
            descriptor,
            factory,
        });
    }

    fn entry(&self, id: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.descriptor.id == id)
    }

    /// Returns descriptors for all registered templates.
    pub fn all_templates(&self) -> Vec<&TemplateDescriptor> {
        self.entries.iter().map(|e| &e.descriptor).collect()
    }

    /// Returns descriptors for templates in a specific category.
    pub fn templates_in_category(&self, category: TemplateCategory) -> Vec<&TemplateDescriptor> {
        self.entries
            .iter()
            .filter(|e| e.descriptor.category == category)
            .map(|e| &e.descriptor)
            .collect()
    }

    /// Get a descriptor by type key.
    pub fn get(&self, id: &str) -> Option<&TemplateDescriptor> {
        self.entry(id).map(|e| &e.descriptor)
    }

    /// Returns `true` if `id` names a registered template.
    pub fn contains(&self, id: &str) -> bool {
        self.entry(id).is_some()
    }

    /// Declared parameters of a template.
    pub fn params(&self, id: &str) -> Option<&'static [ParamDescriptor]> {
        self.get(id).map(|d| d.params)
    }

    /// Descriptor of one parameter of one template.
    pub fn param(&self, id: &str, name: &str) -> Option<&'static ParamDescriptor> {
        self.params(id)?.iter().find(|p| p.name == name)
    }

    /// Returns `true` if the template produces modulation.
    pub fn is_modulator(&self, id: &str) -> bool {
        self.get(id).is_some_and(|d| d.modulator)
    }

    /// Returns the number of registered templates.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no templates are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
