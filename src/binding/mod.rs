//! Fault-isolated value access
//!
//! A [`ValueBinding`] pairs one owner value with one member and the compiled
//! accessor for it. Reads and writes go through [`ValueBinding::get_value`] and
//! [`ValueBinding::set_value`], which can keep the inspected code's failures
//! (errors, panics, log output) inside an [`AccessOutcome`] instead of letting
//! them abort a whole tree refresh.

pub mod diagnostics;

pub use diagnostics::{Diagnostic, DiagnosticCapture, Severity};

use crate::error::{InspectError, Result};
use crate::reflect::{
    AccessError, AccessorCompiler, CompiledAccessor, MemberDescriptor, TypeId, TypeTable, Value,
};
use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};

/// What happened during one get or set attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccessOutcome {
    pub error: Option<AccessError>,
    /// Diagnostics emitted during the attempt, in emission order
    pub diagnostics: Vec<Diagnostic>,
}

impl AccessOutcome {
    fn failed(error: AccessError) -> Self {
        Self {
            error: Some(error),
            diagnostics: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Highest severity among the captured diagnostics.
    pub fn worst_severity(&self) -> Option<Severity> {
        self.diagnostics
            .iter()
            .map(|d| d.severity)
            .max_by_key(|s| match s {
                Severity::Info => 0,
                Severity::Warning => 1,
                Severity::Error => 2,
            })
    }
}

/// Interception flags for one access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessOptions {
    /// Keep diagnostics in the outcome instead of replaying them
    pub handle_error_logs: bool,
    /// Keep errors and panics in the outcome instead of propagating them
    pub catch_exception: bool,
}

impl AccessOptions {
    /// Everything stays inside the outcome. Used by leaf nodes during refresh.
    pub const ISOLATED: AccessOptions = AccessOptions {
        handle_error_logs: true,
        catch_exception: true,
    };

    pub const PASSTHROUGH: AccessOptions = AccessOptions {
        handle_error_logs: false,
        catch_exception: false,
    };
}

impl Default for AccessOptions {
    fn default() -> Self {
        Self::ISOLATED
    }
}

/// Result of a read.
#[derive(Debug, Clone, PartialEq)]
pub struct Accessed {
    pub value: Value,
    pub outcome: AccessOutcome,
}

/// One owner plus one readable/writable slot on it.
pub struct ValueBinding {
    owner: Value,
    owner_type: TypeId,
    member: MemberDescriptor,
    accessor: CompiledAccessor,
    default: Value,
    last_outcome: RefCell<Option<AccessOutcome>>,
    /// Read made by `prefetch_type`, handed to the next `take_prefetched`
    prefetched: RefCell<Option<Accessed>>,
}

impl std::fmt::Debug for ValueBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueBinding")
            .field("owner", &self.owner)
            .field("owner_type", &self.owner_type)
            .field("member", &self.member)
            .finish()
    }
}

impl ValueBinding {
    /// Bind `member` of `owner`. `owner_type` is the declared type the member
    /// was resolved on; the accessor is compiled (or fetched from cache) for it.
    pub fn new(
        owner: Value,
        owner_type: TypeId,
        member: MemberDescriptor,
        compiler: &dyn AccessorCompiler,
        types: &TypeTable,
    ) -> Self {
        let accessor = compiler.compile(owner_type, &member);
        let default = types.default_value(member.value_type());
        Self {
            owner,
            owner_type,
            member,
            accessor,
            default,
            last_outcome: RefCell::new(None),
            prefetched: RefCell::new(None),
        }
    }

    pub fn owner(&self) -> &Value {
        &self.owner
    }

    /// Point the binding at a new owner; the binding (and its node) stay the same.
    pub fn set_owner(&mut self, owner: Value) {
        self.owner = owner;
        self.prefetched.get_mut().take();
    }

    pub fn owner_type(&self) -> TypeId {
        self.owner_type
    }

    pub fn member(&self) -> &MemberDescriptor {
        &self.member
    }

    pub fn can_read(&self) -> bool {
        self.accessor.get.is_some()
    }

    pub fn can_write(&self) -> bool {
        self.accessor.set.is_some()
    }

    /// Default value of the member's declared type.
    pub fn default_value(&self) -> &Value {
        &self.default
    }

    /// Outcome of the most recent get or set.
    pub fn last_outcome(&self) -> Option<AccessOutcome> {
        self.last_outcome.borrow().clone()
    }

    /// Type of the value currently in the slot, falling back to the declared type.
    pub fn current_type(&self, options: AccessOptions) -> TypeId {
        match self.get_value(options.handle_error_logs, true) {
            Ok(accessed) => accessed
                .value
                .runtime_type()
                .unwrap_or(self.member.value_type()),
            Err(_) => self.member.value_type(),
        }
    }

    /// Like [`current_type`](Self::current_type), but keeps the read so the
    /// next [`take_prefetched`](Self::take_prefetched) can reuse it instead
    /// of calling the accessor again.
    pub fn prefetch_type(&self, options: AccessOptions) -> TypeId {
        match self.get_value(options.handle_error_logs, true) {
            Ok(accessed) => {
                let ty = accessed
                    .value
                    .runtime_type()
                    .unwrap_or(self.member.value_type());
                *self.prefetched.borrow_mut() = Some(accessed);
                ty
            }
            Err(_) => self.member.value_type(),
        }
    }

    /// Read kept by the last `prefetch_type`, if it was not consumed yet.
    pub fn take_prefetched(&self) -> Option<Accessed> {
        self.prefetched.borrow_mut().take()
    }

    pub fn clear_prefetched(&self) {
        self.prefetched.borrow_mut().take();
    }

    /// Read the member. On a caught failure the declared type's default is returned.
    pub fn get_value(&self, handle_error_logs: bool, catch_exception: bool) -> Result<Accessed> {
        let getter = self.accessor.get.clone();
        let name = self.member.name();
        let (value, outcome) = self.run(handle_error_logs, catch_exception, |owner| match getter {
            Some(get) => get(owner),
            None => Err(AccessError::WriteOnly(name)),
        })?;

        Ok(Accessed {
            value: value.unwrap_or_else(|| self.default.clone()),
            outcome,
        })
    }

    /// Write the member.
    pub fn set_value(
        &self,
        value: Value,
        handle_error_logs: bool,
        catch_exception: bool,
    ) -> Result<AccessOutcome> {
        self.clear_prefetched();
        let setter = self.accessor.set.clone();
        let name = self.member.name();
        let (_, outcome) = self.run(handle_error_logs, catch_exception, move |owner| {
            match setter {
                Some(set) => set(owner, value),
                None => Err(AccessError::ReadOnly(name)),
            }
        })?;
        Ok(outcome)
    }

    pub fn get_with(&self, options: AccessOptions) -> Result<Accessed> {
        self.get_value(options.handle_error_logs, options.catch_exception)
    }

    pub fn set_with(&self, value: Value, options: AccessOptions) -> Result<AccessOutcome> {
        self.set_value(value, options.handle_error_logs, options.catch_exception)
    }

    fn run<T>(
        &self,
        handle_error_logs: bool,
        catch_exception: bool,
        access: impl FnOnce(&Value) -> std::result::Result<T, AccessError>,
    ) -> Result<(Option<T>, AccessOutcome)> {
        if self.owner.is_null() {
            let outcome = AccessOutcome::failed(AccessError::MissingOwner);
            self.record(&outcome);
            if !catch_exception {
                return Err(InspectError::MissingOwner(self.member.name()));
            }
            return Ok((None, outcome));
        }

        let owner = self.owner.clone();
        let (result, diagnostics) = diagnostics::capture(|| {
            panic::catch_unwind(AssertUnwindSafe(|| access(&owner)))
        });

        let diagnostics = if handle_error_logs {
            diagnostics
        } else {
            diagnostics::replay(&diagnostics);
            Vec::new()
        };

        match result {
            Ok(Ok(value)) => {
                let outcome = AccessOutcome {
                    error: None,
                    diagnostics,
                };
                self.record(&outcome);
                Ok((Some(value), outcome))
            }
            Ok(Err(error)) => {
                let outcome = AccessOutcome {
                    error: Some(error.clone()),
                    diagnostics,
                };
                self.record(&outcome);
                if catch_exception {
                    tracing::trace!("Caught access error on {}: {}", self.member.name(), error);
                    Ok((None, outcome))
                } else {
                    Err(error.into())
                }
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                let outcome = AccessOutcome {
                    error: Some(AccessError::Panicked(message)),
                    diagnostics,
                };
                self.record(&outcome);
                if catch_exception {
                    Ok((None, outcome))
                } else {
                    panic::resume_unwind(payload)
                }
            }
        }
    }

    fn record(&self, outcome: &AccessOutcome) {
        *self.last_outcome.borrow_mut() = Some(outcome.clone());
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
