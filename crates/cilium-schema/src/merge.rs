//! Field-wise merge operators for config value objects.
//!
//! `merge_non_blank` copies `other`'s fields that carry a non-blank value;
//! `overwrite_present` copies every field `other` carries, blank or not.
//! Maps and nested structs merge key-wise and field-wise in both cases.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Whether a value is its type's zero value.
pub trait Blank {
    fn is_blank(&self) -> bool;
}

pub trait Merge {
    fn merge_non_blank(&mut self, other: &Self);
    fn overwrite_present(&mut self, other: &Self);
}

macro_rules! leaf {
    ($($ty:ty => |$v:ident| $blank:expr),* $(,)?) => {
        $(
            impl Blank for $ty {
                fn is_blank(&self) -> bool {
                    let $v = self;
                    $blank
                }
            }

            impl Merge for $ty {
                fn merge_non_blank(&mut self, other: &Self) {
                    if !other.is_blank() {
                        self.clone_from(other);
                    }
                }

                fn overwrite_present(&mut self, other: &Self) {
                    self.clone_from(other);
                }
            }
        )*
    };
}

leaf! {
    String => |v| v.is_empty(),
    bool => |v| !*v,
    i64 => |v| *v == 0,
    u32 => |v| *v == 0,
}

impl<T: Clone> Blank for Vec<T> {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Clone> Merge for Vec<T> {
    fn merge_non_blank(&mut self, other: &Self) {
        if !other.is_empty() {
            self.clone_from(other);
        }
    }

    fn overwrite_present(&mut self, other: &Self) {
        self.clone_from(other);
    }
}

impl<V> Blank for BTreeMap<String, V> {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl<V: Merge + Blank + Clone> Merge for BTreeMap<String, V> {
    fn merge_non_blank(&mut self, other: &Self) {
        for (key, value) in other {
            if value.is_blank() {
                continue;
            }
            match self.get_mut(key) {
                Some(existing) => existing.merge_non_blank(value),
                None => {
                    self.insert(key.clone(), value.clone());
                }
            }
        }
    }

    fn overwrite_present(&mut self, other: &Self) {
        for (key, value) in other {
            match self.get_mut(key) {
                Some(existing) => existing.overwrite_present(value),
                None => {
                    self.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

impl<T: Blank> Blank for Option<T> {
    fn is_blank(&self) -> bool {
        match self {
            Some(value) => value.is_blank(),
            None => true,
        }
    }
}

impl<T: Merge + Blank + Clone> Merge for Option<T> {
    fn merge_non_blank(&mut self, other: &Self) {
        let Some(theirs) = other else {
            return;
        };
        match self {
            Some(ours) => ours.merge_non_blank(theirs),
            None if !theirs.is_blank() => *self = Some(theirs.clone()),
            None => {}
        }
    }

    fn overwrite_present(&mut self, other: &Self) {
        let Some(theirs) = other else {
            return;
        };
        match self {
            Some(ours) => ours.overwrite_present(theirs),
            None => *self = Some(theirs.clone()),
        }
    }
}

impl Blank for Value {
    fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Number(n) => n.as_f64() == Some(0.0),
            Value::String(s) => s.is_empty(),
            Value::Array(a) => a.is_empty(),
            Value::Object(o) => o.is_empty(),
        }
    }
}

impl Merge for Value {
    fn merge_non_blank(&mut self, other: &Self) {
        match (self, other) {
            (Value::Object(ours), Value::Object(theirs)) => merge_json(ours, theirs),
            (ours, theirs) => {
                if !theirs.is_blank() {
                    ours.clone_from(theirs);
                }
            }
        }
    }

    fn overwrite_present(&mut self, other: &Self) {
        match (self, other) {
            (Value::Object(ours), Value::Object(theirs)) => overwrite_json(ours, theirs),
            (ours, theirs) => ours.clone_from(theirs),
        }
    }
}

/// Recursively merge `theirs` into `ours`: objects recurse, blank values are
/// skipped, everything else replaces.
pub fn merge_json(ours: &mut Map<String, Value>, theirs: &Map<String, Value>) {
    for (key, value) in theirs {
        if value.is_blank() {
            continue;
        }
        match ours.get_mut(key) {
            Some(existing) => existing.merge_non_blank(value),
            None => {
                ours.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Recursively overwrite `ours` with every key `theirs` carries.
pub fn overwrite_json(ours: &mut Map<String, Value>, theirs: &Map<String, Value>) {
    for (key, value) in theirs {
        match ours.get_mut(key) {
            Some(existing) => existing.overwrite_present(value),
            None => {
                ours.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Implement `Merge` and `Blank` for a struct by delegating to each field.
#[macro_export]
macro_rules! field_merge {
    ($ty:ty { $($field:ident),* $(,)? }) => {
        impl $crate::merge::Merge for $ty {
            fn merge_non_blank(&mut self, other: &Self) {
                $( $crate::merge::Merge::merge_non_blank(&mut self.$field, &other.$field); )*
            }

            fn overwrite_present(&mut self, other: &Self) {
                $( $crate::merge::Merge::overwrite_present(&mut self.$field, &other.$field); )*
            }
        }

        impl $crate::merge::Blank for $ty {
            fn is_blank(&self) -> bool {
                true $( && $crate::merge::Blank::is_blank(&self.$field) )*
            }
        }
    };
}
