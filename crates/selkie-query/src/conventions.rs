//! Query conventions.
//!
//! Conventions decide which attribute carries an element's identifier for
//! `#id` selectors and what happens to pseudo-classes and pseudo-elements.
//! They are read once, when a context is built; changing the process-wide
//! default later never affects contexts that are already open.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Process-wide default, `None` meaning [`Conventions::default`].
static DEFAULT: RwLock<Option<Conventions>> = RwLock::new(None);

/// How id attribute names are compared.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum IdCase {
    /// `NAME`, `Name` and `name` all denote the same attribute.
    Insensitive,
    /// Only the exact attribute name is recognized.
    Sensitive,
}

/// What to do with pseudo-classes and pseudo-elements.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum PseudoPolicy {
    /// Accept them and apply no filtering, logging a warning once.
    #[default]
    Ignore,
    /// Fail the query with [`crate::SelectError::Unsupported`].
    Reject,
}

type IdNameFn = dyn Fn() -> String + Send + Sync;

/// Configuration read when a context is built.
///
/// ```no_run
/// use selkie_query::{Conventions, IdConvention, PseudoPolicy};
///
/// let conventions = Conventions::new()
///     .with_id_attribute_name(|| "NAME".to_string())
///     .with_pseudo_policy(PseudoPolicy::Reject);
/// assert_eq!(conventions.id_convention(), IdConvention::exact("NAME"));
/// assert_eq!(conventions.pseudo_policy(), PseudoPolicy::Reject);
/// ```
#[derive(Clone, Default)]
pub struct Conventions {
    id_attribute_name: Option<Arc<IdNameFn>>,
    id_case: Option<IdCase>,
    pseudo_policy: PseudoPolicy,
}

impl Conventions {
    /// The legacy conventions: `id` or `name`, any case, pseudo selectors ignored.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a single attribute, named by `name`, as the identifier.
    ///
    /// The closure is called once per context build. Unless overridden with
    /// [`Conventions::with_id_case`], the name is compared exactly.
    #[must_use]
    pub fn with_id_attribute_name(mut self, name: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.id_attribute_name = Some(Arc::new(name));
        self
    }

    /// Override how id attribute names are compared.
    #[must_use]
    pub fn with_id_case(mut self, case: IdCase) -> Self {
        self.id_case = Some(case);
        self
    }

    /// Set the pseudo selector policy.
    #[must_use]
    pub fn with_pseudo_policy(mut self, policy: PseudoPolicy) -> Self {
        self.pseudo_policy = policy;
        self
    }

    /// The pseudo selector policy.
    #[must_use]
    pub fn pseudo_policy(&self) -> PseudoPolicy {
        self.pseudo_policy
    }

    /// Resolve the id convention, calling the name closure if one is set.
    #[must_use]
    pub fn id_convention(&self) -> IdConvention {
        match &self.id_attribute_name {
            Some(name) => IdConvention {
                names: vec![name()],
                case: self.id_case.unwrap_or(IdCase::Sensitive),
            },
            None => IdConvention {
                case: self.id_case.unwrap_or(IdCase::Insensitive),
                ..IdConvention::legacy()
            },
        }
    }

    /// Replace the process-wide default used by contexts opened without
    /// explicit conventions.
    pub fn set_default(conventions: Self) {
        *DEFAULT.write().unwrap_or_else(PoisonError::into_inner) = Some(conventions);
    }

    /// A copy of the current process-wide default.
    #[must_use]
    pub fn current_default() -> Self {
        DEFAULT
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_default()
    }

    /// Restore the built-in default.
    pub fn reset_default() {
        *DEFAULT.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl fmt::Debug for Conventions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conventions")
            .field("id_attribute_name", &self.id_attribute_name.as_ref().map(|name| name()))
            .field("id_case", &self.id_case)
            .field("pseudo_policy", &self.pseudo_policy)
            .finish()
    }
}

/// A resolved id convention: which attribute names denote an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdConvention {
    names: Vec<String>,
    case: IdCase,
}

impl IdConvention {
    /// `id` and `name`, compared case-insensitively.
    #[must_use]
    pub fn legacy() -> Self {
        Self {
            names: vec!["id".to_string(), "name".to_string()],
            case: IdCase::Insensitive,
        }
    }

    /// Exactly one attribute name, compared exactly.
    #[must_use]
    pub fn exact(name: impl Into<String>) -> Self {
        Self {
            names: vec![name.into()],
            case: IdCase::Sensitive,
        }
    }

    /// The recognized attribute names.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Whether `attribute` carries an identifier under this convention.
    #[must_use]
    pub fn matches(&self, attribute: &str) -> bool {
        self.names.iter().any(|name| match self.case {
            IdCase::Insensitive => name.eq_ignore_ascii_case(attribute),
            IdCase::Sensitive => name == attribute,
        })
    }
}

impl Default for IdConvention {
    fn default() -> Self {
        Self::legacy()
    }
}

/// Serializable form of [`Conventions`].
///
/// ```json
/// { "id-attribute-name": "NAME", "pseudo-policy": "reject" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ConventionsConfig {
    /// Fixed id attribute name; absent means the legacy `id`/`name` pair.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_attribute_name: Option<String>,
    /// Id name comparison; absent means the convention's own default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_case: Option<IdCase>,
    /// Pseudo selector policy.
    pub pseudo_policy: PseudoPolicy,
}

impl From<ConventionsConfig> for Conventions {
    fn from(config: ConventionsConfig) -> Self {
        let mut conventions = Self::new().with_pseudo_policy(config.pseudo_policy);
        if let Some(name) = config.id_attribute_name {
            conventions = conventions.with_id_attribute_name(move || name.clone());
        }
        if let Some(case) = config.id_case {
            conventions = conventions.with_id_case(case);
        }
        conventions
    }
}
