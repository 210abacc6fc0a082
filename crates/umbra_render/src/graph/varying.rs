//! Typed data-flow handles between jobs.
//!
//! A [`Varying<T>`] names one value in a task's per-frame [`Varyings`] store.
//! Every varying is created by exactly one producing job (its output slot),
//! read by any number of later jobs, and written at most once per frame.
//!
//! # Design
//!
//! The store erases values to `Box<dyn Any>`; the handle keeps the static
//! type, so every read is a checked downcast that fails with
//! [`GraphError::TypeMismatch`] instead of reinterpreting memory.
//!
//! Jobs with several outputs declare a plain struct and list its fields with
//! [`job_outputs!`](crate::job_outputs). The macro emits one typed
//! [`Field`] constant per output, and [`Varying::get_n`] projects such a
//! field into its own `Varying`:
//!
//! ```text
//! PrepareDeferred ──► Varying<PrepareDeferredOutputs>
//!                          ├── get_n(DEFERRED_FRAMEBUFFER) ──► Varying<DeferredFramebuffer>
//!                          └── get_n(LIGHTING_FRAMEBUFFER) ──► Varying<FramebufferId>
//! ```
//!
//! Projections are plain data (slot, field index, projector fn), so handles
//! stay `Copy` and two projections of the same field compare equal.

use std::any::{Any, type_name};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use umbra_core::errors::GraphError;

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one task graph. Varyings carry it so that handles from one
/// graph cannot be wired into, or read from, another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(u64);

impl GraphId {
    pub(crate) fn next() -> Self {
        Self(NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

// ─── Multi-output projection ───────────────────────────────────────────────

/// Implemented by job output structs that expose individually addressable
/// fields. Use [`job_outputs!`](crate::job_outputs) rather than writing it by hand.
pub trait JobOutputs: Any {
    /// Returns field `index` as `&dyn Any`, or `None` for unknown indices.
    fn field(&self, index: usize) -> Option<&dyn Any>;
}

/// Typed address of one field of a [`JobOutputs`] struct.
pub struct Field<T, U> {
    index: usize,
    _marker: PhantomData<fn(&T) -> &U>,
}

impl<T, U> Field<T, U> {
    #[doc(hidden)]
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }
}

impl<T, U> Clone for Field<T, U> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, U> Copy for Field<T, U> {}

type Projector = fn(&dyn Any, usize) -> Option<&dyn Any>;

fn project_field<T: JobOutputs>(value: &dyn Any, index: usize) -> Option<&dyn Any> {
    value.downcast_ref::<T>()?.field(index)
}

#[derive(Clone, Copy)]
struct Projection {
    index: usize,
    project: Projector,
}

/// Declares the addressable fields of a multi-output job struct.
///
/// ```rust,ignore
/// #[derive(Default)]
/// pub struct LinearDepthOutputs {
///     pub framebuffer: FramebufferId,
///     pub linear_depth: TextureId,
/// }
///
/// job_outputs!(LinearDepthOutputs {
///     0 => framebuffer: FramebufferId as FRAMEBUFFER,
///     1 => linear_depth: TextureId as LINEAR_DEPTH,
/// });
///
/// let depth: Varying<TextureId> = linear_depth_output.get_n(LinearDepthOutputs::LINEAR_DEPTH);
/// ```
#[macro_export]
macro_rules! job_outputs {
    ($ty:ident { $( $idx:literal => $field:ident : $fty:ty as $konst:ident ),* $(,)? }) => {
        impl $ty {
            $(
                pub const $konst: $crate::graph::Field<$ty, $fty> = $crate::graph::Field::new($idx);
            )*
        }

        impl $crate::graph::JobOutputs for $ty {
            fn field(&self, index: usize) -> Option<&dyn ::std::any::Any> {
                match index {
                    $(
                        $idx => {
                            let value: &$fty = &self.$field;
                            Some(value as &dyn ::std::any::Any)
                        }
                    )*
                    _ => None,
                }
            }
        }
    };
}

// ─── Varying ───────────────────────────────────────────────────────────────

/// Typed handle to a value produced by one job and consumed by later jobs.
pub struct Varying<T> {
    graph: GraphId,
    slot: usize,
    projection: Option<Projection>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Varying<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Varying<T> {}

impl<T> PartialEq for Varying<T> {
    fn eq(&self, other: &Self) -> bool {
        self.graph == other.graph
            && self.slot == other.slot
            && self.field_index() == other.field_index()
    }
}

impl<T> Eq for Varying<T> {}

impl<T> fmt::Debug for Varying<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Varying")
            .field("graph", &self.graph.0)
            .field("slot", &self.slot)
            .field("field", &self.field_index())
            .field("type", &type_name::<T>())
            .finish()
    }
}

impl<T> Varying<T> {
    #[inline]
    #[must_use]
    pub fn graph(&self) -> GraphId {
        self.graph
    }

    /// Output slot of the producing job.
    #[inline]
    #[must_use]
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Field index when this handle is a projection of a multi-output varying.
    #[inline]
    #[must_use]
    pub fn field_index(&self) -> Option<usize> {
        self.projection.map(|p| p.index)
    }
}

impl<T: 'static> Varying<T> {
    pub(crate) fn new(graph: GraphId, slot: usize) -> Self {
        Self {
            graph,
            slot,
            projection: None,
            _marker: PhantomData,
        }
    }

    /// Projects output field `field` of a multi-output varying.
    ///
    /// Calling it twice with the same field yields equal handles that resolve
    /// to the same value.
    #[must_use]
    pub fn get_n<U: 'static>(&self, field: Field<T, U>) -> Varying<U>
    where
        T: JobOutputs,
    {
        debug_assert!(
            self.projection.is_none(),
            "nested output projections are not supported"
        );
        Varying {
            graph: self.graph,
            slot: self.slot,
            projection: Some(Projection {
                index: field.index,
                project: project_field::<T>,
            }),
            _marker: PhantomData,
        }
    }

    /// Untyped view used for wiring checks and dependency introspection.
    #[must_use]
    pub fn as_any(&self) -> AnyVarying {
        AnyVarying {
            graph: self.graph,
            slot: self.slot,
            field: self.field_index(),
            type_name: type_name::<T>(),
        }
    }
}

/// Type-erased varying description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnyVarying {
    pub graph: GraphId,
    pub slot: usize,
    pub field: Option<usize>,
    pub type_name: &'static str,
}

// ─── Per-frame store ───────────────────────────────────────────────────────

/// Per-frame storage for every varying of one task graph.
///
/// Slots are write-once between two [`Varyings::reset`] calls.
pub struct Varyings {
    graph: GraphId,
    slots: Vec<Option<Box<dyn Any>>>,
}

impl Varyings {
    pub(crate) fn new(graph: GraphId, slot_count: usize) -> Self {
        Self {
            graph,
            slots: std::iter::repeat_with(|| None).take(slot_count).collect(),
        }
    }

    #[inline]
    #[must_use]
    pub fn graph(&self) -> GraphId {
        self.graph
    }

    /// Resolves a varying to a reference to its current value.
    pub fn get<T: 'static>(&self, varying: &Varying<T>) -> Result<&T, GraphError> {
        if varying.graph != self.graph {
            return Err(GraphError::WrongStore {
                expected: self.graph.0,
                found: varying.graph.0,
            });
        }

        let slot = varying.slot;
        let value: &dyn Any = self
            .slots
            .get(slot)
            .and_then(Option::as_deref)
            .ok_or(GraphError::Unproduced { slot })?;

        let value = match varying.projection {
            Some(projection) => (projection.project)(value, projection.index).ok_or(
                GraphError::MissingField {
                    slot,
                    index: projection.index,
                },
            )?,
            None => value,
        };

        value.downcast_ref::<T>().ok_or(GraphError::TypeMismatch {
            slot,
            expected: type_name::<T>(),
        })
    }

    /// Returns `true` once the producer of `slot` has run (or been skipped) this frame.
    #[must_use]
    pub fn is_produced(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(Option::is_some)
    }

    /// Number of slots written this frame.
    #[must_use]
    pub fn produced_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn insert(&mut self, slot: usize, value: Box<dyn Any>) -> Result<(), GraphError> {
        let entry = self
            .slots
            .get_mut(slot)
            .ok_or(GraphError::Unproduced { slot })?;
        if entry.is_some() {
            return Err(GraphError::AlreadyProduced { slot });
        }
        *entry = Some(value);
        Ok(())
    }

    pub(crate) fn reset(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }
}
