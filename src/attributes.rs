//! Per element kind attribute layouts.
//!
//! Every element owns an [`AttrBlock`] whose values follow the [`AttrSchema`]
//! of its kind. Blocks are copied, swapped and dropped as plain values; the
//! schema is only needed to create defaults and to translate blocks between
//! two layouts (e.g. between the live mesh and an undo entry).
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Name of the reserved layer that stores stable element ids.
pub const ID_LAYER: &str = "_bm_id";
/// Value stored in the id layer of an element without an id.
pub const NO_ID: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttrKind {
    Float,
    Int,
    Float2,
    Float3,
    Color,
    Bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Float(f32),
    Int(i32),
    Float2([f32; 2]),
    Float3([f32; 3]),
    Color([f32; 4]),
    Bool(bool),
}

impl AttrValue {
    pub fn kind(&self) -> AttrKind {
        match self {
            AttrValue::Float(_) => AttrKind::Float,
            AttrValue::Int(_) => AttrKind::Int,
            AttrValue::Float2(_) => AttrKind::Float2,
            AttrValue::Float3(_) => AttrKind::Float3,
            AttrValue::Color(_) => AttrKind::Color,
            AttrValue::Bool(_) => AttrKind::Bool,
        }
    }
}

impl AttrKind {
    pub fn default_value(self) -> AttrValue {
        match self {
            AttrKind::Float => AttrValue::Float(0.0),
            AttrKind::Int => AttrValue::Int(0),
            AttrKind::Float2 => AttrValue::Float2([0.0; 2]),
            AttrKind::Float3 => AttrValue::Float3([0.0; 3]),
            AttrKind::Color => AttrValue::Color([1.0; 4]),
            AttrKind::Bool => AttrValue::Bool(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrLayer {
    pub name: String,
    pub kind: AttrKind,
}

/// Attribute values of a single element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttrBlock(SmallVec<[AttrValue; 4]>);

impl AttrBlock {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, layer: usize) -> Option<&AttrValue> {
        self.0.get(layer)
    }

    /// Overwrite a value. Values of the wrong kind are rejected.
    pub fn set(&mut self, layer: usize, value: AttrValue) -> bool {
        match self.0.get_mut(layer) {
            Some(slot) if slot.kind() == value.kind() => {
                *slot = value;
                true
            }
            _ => false,
        }
    }

    pub fn values(&self) -> &[AttrValue] {
        &self.0
    }
}

/// Ordered list of layers for one element kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrSchema {
    layers: Vec<AttrLayer>,
}

impl AttrSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layers(&self) -> &[AttrLayer] {
        &self.layers
    }

    pub fn layer_index(&self, name: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.name == name)
    }

    /// Append a layer, returning its index. Adding an existing name with the
    /// same kind returns the existing index.
    pub(crate) fn push_layer(&mut self, name: &str, kind: AttrKind) -> Option<usize> {
        if let Some(i) = self.layer_index(name) {
            return (self.layers[i].kind == kind).then_some(i);
        }
        self.layers.push(AttrLayer {
            name: name.to_owned(),
            kind,
        });
        Some(self.layers.len() - 1)
    }

    /// Block with every layer set to its default.
    pub fn alloc_block(&self) -> AttrBlock {
        AttrBlock(self.layers.iter().map(|l| l.kind.default_value()).collect())
    }

    /// Copy a block laid out by this same schema.
    pub fn copy_block(&self, src: &AttrBlock) -> AttrBlock {
        debug_assert_eq!(src.len(), self.layers.len());
        src.clone()
    }

    /// Translate a block laid out by `src_schema` into this layout. Layers are
    /// matched by name and kind, unmatched layers get defaults.
    pub fn copy_block_from(&self, src_schema: &AttrSchema, src: &AttrBlock) -> AttrBlock {
        if src_schema == self {
            return self.copy_block(src);
        }

        AttrBlock(
            self.layers
                .iter()
                .map(|layer| {
                    src_schema
                        .layer_index(&layer.name)
                        .and_then(|i| src.get(i))
                        .filter(|v| v.kind() == layer.kind)
                        .copied()
                        .unwrap_or_else(|| layer.kind.default_value())
                })
                .collect(),
        )
    }

    /// Copy every layer but the id from `src` into `dst`, both laid out by
    /// this schema.
    pub fn copy_values(&self, dst: &mut AttrBlock, src: &AttrBlock) {
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.name == ID_LAYER {
                continue;
            }
            if let Some(value) = src.get(i) {
                dst.set(i, *value);
            }
        }
    }

    /// Write `a + (b - a) * t` into `dst` for every float valued layer.
    /// Integer and boolean layers of `dst` are left alone.
    pub fn interp_into(&self, dst: &mut AttrBlock, a: &AttrBlock, b: &AttrBlock, t: f32) {
        fn lerp<const N: usize>(a: [f32; N], b: [f32; N], t: f32) -> [f32; N] {
            std::array::from_fn(|i| a[i] + (b[i] - a[i]) * t)
        }

        for i in 0..self.layers.len() {
            let value = match (a.get(i), b.get(i)) {
                (Some(AttrValue::Float(x)), Some(AttrValue::Float(y))) => {
                    AttrValue::Float(lerp([*x], [*y], t)[0])
                }
                (Some(AttrValue::Float2(x)), Some(AttrValue::Float2(y))) => {
                    AttrValue::Float2(lerp(*x, *y, t))
                }
                (Some(AttrValue::Float3(x)), Some(AttrValue::Float3(y))) => {
                    AttrValue::Float3(lerp(*x, *y, t))
                }
                (Some(AttrValue::Color(x)), Some(AttrValue::Color(y))) => {
                    AttrValue::Color(lerp(*x, *y, t))
                }
                _ => continue,
            };
            dst.set(i, value);
        }
    }

    /// Swap the contents of two blocks of this layout.
    pub fn swap_blocks(&self, a: &mut AttrBlock, b: &mut AttrBlock) {
        std::mem::swap(a, b);
    }

    /// Typed access to a layer, `None` when missing or of another kind.
    pub fn accessor<T: AttrType>(&self, name: &str) -> Option<Accessor<T>> {
        let index = self.layer_index(name)?;
        (self.layers[index].kind == T::KIND).then_some(Accessor {
            index,
            _marker: PhantomData,
        })
    }
}

/// Rust types that can be stored in a layer.
pub trait AttrType: Sized + Copy {
    const KIND: AttrKind;
    fn from_value(value: &AttrValue) -> Option<Self>;
    fn into_value(self) -> AttrValue;
}

macro_rules! impl_attr_type {
    ($ty:ty, $variant:ident) => {
        impl AttrType for $ty {
            const KIND: AttrKind = AttrKind::$variant;

            fn from_value(value: &AttrValue) -> Option<Self> {
                match value {
                    AttrValue::$variant(v) => Some(*v),
                    _ => None,
                }
            }

            fn into_value(self) -> AttrValue {
                AttrValue::$variant(self)
            }
        }
    };
}

impl_attr_type!(f32, Float);
impl_attr_type!(i32, Int);
impl_attr_type!([f32; 2], Float2);
impl_attr_type!([f32; 3], Float3);
impl_attr_type!([f32; 4], Color);
impl_attr_type!(bool, Bool);

/// Typed handle to one layer of a schema.
#[derive(Debug)]
pub struct Accessor<T> {
    index: usize,
    _marker: PhantomData<T>,
}

impl<T> Clone for Accessor<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Accessor<T> {}

impl<T: AttrType> Accessor<T> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn get(&self, block: &AttrBlock) -> Option<T> {
        block.get(self.index).and_then(T::from_value)
    }

    pub fn set(&self, block: &mut AttrBlock, value: T) -> bool {
        block.set(self.index, value.into_value())
    }
}
