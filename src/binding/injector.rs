use std::sync::Arc;

use chrono::NaiveDateTime;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value as JsonValue;

use super::bag::{BindingEntry, Role, SharedBag, Source, lock_bag};
use super::cell::ValueCell;
use crate::coercion::coerce;
use crate::error::ValidationError;
use crate::tags::TagAllocator;
use crate::types::{BindMode, SemanticType, SqlValue};

lazy_static! {
    static ref BACKEND_VAR: Regex = Regex::new(r"^@?[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// Per-call type and nullability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindOpts {
    pub ty: Option<SemanticType>,
    pub nullable: bool,
}

impl BindOpts {
    #[must_use]
    pub fn typed(ty: SemanticType) -> Self {
        Self {
            ty: Some(ty),
            nullable: false,
        }
    }

    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

impl From<SemanticType> for BindOpts {
    fn from(ty: SemanticType) -> Self {
        Self::typed(ty)
    }
}

/// Injector input: an owned value or a live cell.
#[derive(Debug, Clone)]
pub enum Param {
    Value(SqlValue),
    Cell(ValueCell),
}

impl From<ValueCell> for Param {
    fn from(cell: ValueCell) -> Self {
        Param::Cell(cell)
    }
}

impl From<&ValueCell> for Param {
    fn from(cell: &ValueCell) -> Self {
        Param::Cell(cell.clone())
    }
}

macro_rules! param_from_value {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for Param {
                fn from(value: $t) -> Self {
                    Param::Value(SqlValue::from(value))
                }
            }
        )*
    };
}

param_from_value!(
    SqlValue,
    i64,
    i32,
    i16,
    u32,
    u16,
    u8,
    f64,
    f32,
    bool,
    String,
    &str,
    Vec<u8>,
    &[u8],
    NaiveDateTime,
    JsonValue,
);

impl<T: Into<SqlValue>> From<Option<T>> for Param {
    fn from(value: Option<T>) -> Self {
        Param::Value(SqlValue::from(value))
    }
}

/// The single capability every injector offers: register a value, get back the text to
/// splice into the SQL template.
pub trait Inject {
    type Input;

    /// Register `input` and return the text to splice into the SQL template.
    ///
    /// # Errors
    /// Returns `ValidationError` when the value is not scalar, is null without
    /// `opts.nullable`, cannot be cast, or when `opts.ty` conflicts with a locked type.
    fn inject(&self, input: Self::Input, opts: BindOpts) -> Result<String, ValidationError>;
}

/// State shared by every injector variant: `{ mode, locked_type }` plus the bag it
/// feeds and the allocator it draws tags from.
#[derive(Clone)]
pub(crate) struct InjectorCore {
    mode: BindMode,
    locked: Option<SemanticType>,
    bag: SharedBag,
    tags: TagAllocator,
    prefix: Arc<str>,
}

impl InjectorCore {
    pub(crate) fn new(mode: BindMode, bag: SharedBag, tags: TagAllocator, prefix: Arc<str>) -> Self {
        Self {
            mode,
            locked: None,
            bag,
            tags,
            prefix,
        }
    }

    fn lock_type(&mut self, ty: SemanticType) -> Result<(), ValidationError> {
        match self.locked {
            Some(locked) => Err(ValidationError::Redefinition {
                locked,
                requested: ty,
            }),
            None => {
                self.locked = Some(ty);
                Ok(())
            }
        }
    }

    fn resolve_type(&self, requested: Option<SemanticType>) -> Result<SemanticType, ValidationError> {
        match (self.locked, requested) {
            (Some(locked), Some(requested)) => Err(ValidationError::Redefinition { locked, requested }),
            (Some(locked), None) => Ok(locked),
            (None, Some(requested)) => Ok(requested),
            (None, None) => Ok(SemanticType::Str),
        }
    }

    fn source_for(&self, param: Param, ty: SemanticType, nullable: bool) -> Result<Source, ValidationError> {
        match (self.mode, param) {
            (BindMode::ByReference, Param::Cell(cell)) => {
                // nullability is checked at bind time, once the caller has filled the cell
                if !cell.get().is_scalar() {
                    return Err(non_scalar());
                }
                Ok(Source::Live(cell))
            }
            (BindMode::ByReference, Param::Value(_)) => Err(ValidationError::InvalidValue(
                "binding by reference needs a ValueCell".into(),
            )),
            (_, Param::Value(value)) => {
                coerce(&value, ty, nullable)?;
                Ok(Source::Owned(value))
            }
            (_, Param::Cell(cell)) => {
                let value = cell.get();
                coerce(&value, ty, nullable)?;
                Ok(Source::Owned(value))
            }
        }
    }

    fn register(&self, source: Source, ty: SemanticType, nullable: bool, role: Role) -> String {
        let tag = self.tags.next_tag(Some(&self.prefix));
        tracing::trace!(tag = %tag, ?role, ?ty, "registering binding");
        lock_bag(&self.bag).push(BindingEntry::new(tag.clone(), source, ty, nullable, role));
        tag
    }
}

fn non_scalar() -> ValidationError {
    ValidationError::InvalidValue(
        "scalar value expected, got an aggregate that cannot be converted to a string".into(),
    )
}

fn check_var(var: &str) -> Result<(), ValidationError> {
    if BACKEND_VAR.is_match(var) {
        Ok(())
    } else {
        Err(ValidationError::InvalidValue(format!(
            "invalid backend variable name: {var}"
        )))
    }
}

/// IN injector: the value feeds the statement itself.
///
/// ```rust
/// use sql_bindery::prelude::*;
/// use std::sync::Arc;
///
/// let registry = Registry::new();
/// let session = Session::new(&registry);
/// let mut by_value = session.injector_in(BindMode::ByValue);
/// by_value.lock_type(SemanticType::Int)?;
/// let tag = by_value.inject(Param::from("10"), BindOpts::default())?;
/// let sql = format!("SELECT * FROM t_video WHERE video_stock = {tag}");
/// assert!(sql.ends_with(&tag));
/// assert_eq!(session.token_count(), 1);
/// # Ok::<(), sql_bindery::error::ValidationError>(())
/// ```
#[derive(Clone)]
pub struct InInjector {
    core: InjectorCore,
}

impl InInjector {
    pub(crate) fn new(core: InjectorCore) -> Self {
        Self { core }
    }

    #[must_use]
    pub fn mode(&self) -> BindMode {
        self.core.mode
    }

    #[must_use]
    pub fn locked_type(&self) -> Option<SemanticType> {
        self.core.locked
    }

    /// Lock the semantic type once. Later calls must omit it: any explicit type,
    /// even the locked one, is rejected with `Redefinition`.
    ///
    /// # Errors
    /// Returns `ValidationError::Redefinition` if a type is already locked.
    pub fn lock_type(&mut self, ty: SemanticType) -> Result<(), ValidationError> {
        self.core.lock_type(ty)
    }

    /// Shorthand for [`Inject::inject`] with an explicit type.
    ///
    /// # Errors
    /// See [`Inject::inject`].
    pub fn inject_as(&self, input: impl Into<Param>, ty: SemanticType) -> Result<String, ValidationError> {
        self.inject(input.into(), BindOpts::typed(ty))
    }
}

impl Inject for InInjector {
    type Input = Param;

    fn inject(&self, input: Param, opts: BindOpts) -> Result<String, ValidationError> {
        let ty = self.core.resolve_type(opts.ty)?;
        let source = self.core.source_for(input, ty, opts.nullable)?;
        Ok(self
            .core
            .register(source, ty, opts.nullable, Role::In(self.core.mode)))
    }
}

/// INOUT injector: pairs a backend variable with a local value. Returns the variable
/// name for the call template.
#[derive(Clone)]
pub struct InOutInjector {
    core: InjectorCore,
}

impl InOutInjector {
    pub(crate) fn new(core: InjectorCore) -> Self {
        Self { core }
    }

    #[must_use]
    pub fn mode(&self) -> BindMode {
        self.core.mode
    }

    /// # Errors
    /// Returns `ValidationError::Redefinition` if a type is already locked.
    pub fn lock_type(&mut self, ty: SemanticType) -> Result<(), ValidationError> {
        self.core.lock_type(ty)
    }
}

impl Inject for InOutInjector {
    type Input = (String, Param);

    fn inject(&self, (var, input): (String, Param), opts: BindOpts) -> Result<String, ValidationError> {
        check_var(&var)?;
        let ty = self.core.resolve_type(opts.ty)?;
        let source = self.core.source_for(input, ty, opts.nullable)?;
        let role = Role::InOut {
            mode: self.core.mode,
            var: var.clone(),
        };
        self.core.register(source, ty, opts.nullable, role);
        Ok(var)
    }
}

/// OUT injector: declares a backend variable read back after the call.
#[derive(Clone)]
pub struct OutInjector {
    core: InjectorCore,
}

impl OutInjector {
    pub(crate) fn new(core: InjectorCore) -> Self {
        Self { core }
    }

    /// # Errors
    /// Returns `ValidationError::Redefinition` if a type is already locked.
    pub fn lock_type(&mut self, ty: SemanticType) -> Result<(), ValidationError> {
        self.core.lock_type(ty)
    }
}

impl Inject for OutInjector {
    type Input = String;

    fn inject(&self, var: String, opts: BindOpts) -> Result<String, ValidationError> {
        check_var(&var)?;
        let declared = match (self.core.locked, opts.ty) {
            (None, None) => None,
            (_, requested) => Some(self.core.resolve_type(requested)?),
        };
        let role = Role::Out {
            var: var.clone(),
            declared,
        };
        self.core.register(
            Source::Owned(SqlValue::Null),
            declared.unwrap_or_default(),
            true,
            role,
        );
        Ok(var)
    }
}
