//! Method visibility for dynamically dispatched calls.
//!
//! Rust's own `pub`/`pub(crate)` covers every call site known at compile time. Calls
//! that arrive by name (a router invoking a collection operation, a script driving an
//! accessor) bypass it, so those go through an explicit table instead:
//!
//! - every class declares a [`ClassDescriptor`] listing its methods, its parent and a
//!   [`MethodsVisibility`] table (`public` and `protected` lists; anything else it
//!   declares is private);
//! - the caller keeps a [`CallStack`] of [`Frame`]s;
//! - before a guarded call, [`CallStack::resolve`] finds the declaring class of the
//!   method, the nearest real caller on the stack, and derives a
//!   [`MethodAccessibility`] record from the pair.
//!
//! | visibility  | `SameClass` | `Descendant` | `Other` |
//! |-------------|-------------|--------------|---------|
//! | `Public`    | yes         | yes          | yes     |
//! | `Protected` | yes         | yes          | no      |
//! | `Private`   | yes         | no           | no      |

use std::{borrow::Cow, fmt};

use tracing::debug;

use crate::error::{EntityError, EntityResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

/// How the initiating class relates to the declaring class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitiatorRelation {
    SameClass,
    /// A strict subtype of the declaring class.
    Descendant,
    /// Unrelated, or no class at all (top-level code).
    Other,
}

impl Visibility {
    pub fn permits(&self, relation: InitiatorRelation) -> bool {
        match self {
            Visibility::Public => true,
            Visibility::Protected => relation != InitiatorRelation::Other,
            Visibility::Private => relation == InitiatorRelation::SameClass,
        }
    }
}

/// Static visibility table of one class.
#[derive(Debug, Clone, Copy)]
pub struct MethodsVisibility {
    pub public: &'static [&'static str],
    pub protected: &'static [&'static str],
}

impl MethodsVisibility {
    pub const fn new(public: &'static [&'static str], protected: &'static [&'static str]) -> Self {
        Self { public, protected }
    }

    /// Looks up the tier of `method`. A method listed as both public and protected is a
    /// broken table, not a lookup miss.
    pub fn visibility_of(&self, method: &str) -> EntityResult<Visibility> {
        if let Some(duplicate) = self.public.iter().find(|name| self.protected.contains(name)) {
            return Err(EntityError::invariant(format!(
                "method {duplicate} is declared both public and protected"
            )));
        }

        Ok(if self.public.contains(&method) {
            Visibility::Public
        } else if self.protected.contains(&method) {
            Visibility::Protected
        } else {
            Visibility::Private
        })
    }
}

/// Runtime description of a class taking part in guarded dispatch.
///
/// Descriptors are meant to live in `static` items; identity is the class name.
#[derive(Debug)]
pub struct ClassDescriptor {
    pub name: &'static str,
    pub parent: Option<&'static ClassDescriptor>,
    /// Methods declared (not inherited) by this class.
    pub methods: &'static [&'static str],
    pub visibility: MethodsVisibility,
    /// Dispatcher and base plumbing frames are transparent to initiator lookup.
    pub infrastructure: bool,
}

impl ClassDescriptor {
    pub const fn new(
        name: &'static str,
        parent: Option<&'static ClassDescriptor>,
        methods: &'static [&'static str],
        visibility: MethodsVisibility,
    ) -> Self {
        Self { name, parent, methods, visibility, infrastructure: false }
    }

    pub const fn infrastructure(name: &'static str) -> Self {
        Self {
            name,
            parent: None,
            methods: &[],
            visibility: MethodsVisibility::new(&[], &[]),
            infrastructure: true,
        }
    }

    pub fn is(&self, other: &ClassDescriptor) -> bool {
        self.name == other.name
    }

    /// Strict subtype test.
    pub fn is_subclass_of(&self, other: &ClassDescriptor) -> bool {
        self.ancestors().any(|ancestor| ancestor.is(other))
    }

    /// The nearest class, starting with `self`, that declares `method`.
    pub fn declaring_class(&'static self, method: &str) -> Option<&'static ClassDescriptor> {
        std::iter::once(self)
            .chain(self.ancestors())
            .find(|class| class.methods.contains(&method))
    }

    fn ancestors(&self) -> impl Iterator<Item = &'static ClassDescriptor> {
        std::iter::successors(self.parent, |class| class.parent)
    }
}

/// Implemented by types whose methods may be invoked by name.
pub trait Visible {
    fn class() -> &'static ClassDescriptor;
}

/// One activation on the call stack.
#[derive(Debug, Clone)]
pub struct Frame {
    pub class: Option<&'static ClassDescriptor>,
    pub method: Cow<'static, str>,
}

impl Frame {
    pub fn new(class: &'static ClassDescriptor, method: impl Into<Cow<'static, str>>) -> Self {
        Self { class: Some(class), method: method.into() }
    }

    /// A frame of free-standing code that belongs to no class.
    pub fn script(method: impl Into<Cow<'static, str>>) -> Self {
        Self { class: None, method: method.into() }
    }
}

/// The decision taken for one guarded invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodAccessibility {
    pub method: String,
    pub declaring_class: &'static str,
    pub visibility: Visibility,
    pub initiator_class: Option<&'static str>,
    pub relation: InitiatorRelation,
    pub accessible: bool,
}

impl fmt::Display for MethodAccessibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}::{} ({:?}) from {} ({:?}): {}",
            self.declaring_class,
            self.method,
            self.visibility,
            self.initiator_class.unwrap_or("<top level>"),
            self.relation,
            if self.accessible { "allowed" } else { "denied" },
        )
    }
}

/// The chain of guarded activations of one execution context, innermost last.
#[derive(Debug, Clone, Default)]
pub struct CallStack {
    frames: Vec<Frame>,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// The nearest real caller of `method`: walking outward from the innermost frame,
    /// class-less frames, infrastructure frames and recursive frames of the same
    /// method are skipped.
    pub fn initiator(&self, method: &str) -> Option<&'static ClassDescriptor> {
        self.frames
            .iter()
            .rev()
            .filter_map(|frame| frame.class.map(|class| (class, frame.method.as_ref())))
            .find(|(class, frame_method)| !class.infrastructure && *frame_method != method)
            .map(|(class, _)| class)
    }

    /// Computes whether the current context may call `method` on an instance of `class`.
    pub fn resolve(
        &self,
        class: &'static ClassDescriptor,
        method: &str,
    ) -> EntityResult<MethodAccessibility> {
        let declaring = class.declaring_class(method).ok_or_else(|| {
            EntityError::invariant(format!(
                "method {method} does not exist in class {}",
                class.name
            ))
        })?;
        let visibility = declaring.visibility.visibility_of(method)?;

        let initiator = self.initiator(method);
        let relation = match initiator {
            Some(caller) if caller.is(declaring) => InitiatorRelation::SameClass,
            Some(caller) if caller.is_subclass_of(declaring) => InitiatorRelation::Descendant,
            _ => InitiatorRelation::Other,
        };

        Ok(MethodAccessibility {
            method: method.to_string(),
            declaring_class: declaring.name,
            visibility,
            initiator_class: initiator.map(|caller| caller.name),
            relation,
            accessible: visibility.permits(relation),
        })
    }

    /// Like [`CallStack::resolve`], failing with [`EntityError::AccessDenied`] when the
    /// call is not permitted.
    pub fn ensure_accessible(
        &self,
        class: &'static ClassDescriptor,
        method: &str,
    ) -> EntityResult<MethodAccessibility> {
        let record = self.resolve(class, method)?;
        if record.accessible {
            Ok(record)
        } else {
            debug!(target: "docent::access", record = %record, "access denied");
            Err(EntityError::AccessDenied(
                record.method,
                record.declaring_class.to_string(),
            ))
        }
    }

    /// Checks access, then runs `body` with the callee's frame pushed.
    pub fn call<R>(
        &mut self,
        class: &'static ClassDescriptor,
        method: &'static str,
        body: impl FnOnce(&mut CallStack) -> R,
    ) -> EntityResult<R> {
        let record = self.ensure_accessible(class, method)?;
        let declaring = class.declaring_class(method).unwrap_or(class);
        debug_assert_eq!(declaring.name, record.declaring_class);

        self.push(Frame::new(declaring, method));
        let result = body(self);
        self.pop();

        Ok(result)
    }
}
