//! Reference-counted heap arena (spec.md §4.5 "ext values"). Backs every
//! `ext` runtime value — string, json, typeid, struct, vector, dict,
//! function — so frame teardown can decrement refcounts by `ext_bits`
//! without knowing each slot's concrete shape.

use serde_json::Value as JsonValue;

use crate::typeid::TypeId;

pub type HeapId = usize;

/// Not `Clone`: a member `Vec<Value>` can hold `Ref`s, and cloning those
/// without bumping their refcount is exactly the leak/use-after-free
/// `Value` itself guards against. Copy members one at a time through
/// `Value::clone_with_heap` instead.
#[derive(Debug)]
pub enum HeapData {
    String(String),
    Json(JsonValue),
    Typeid(TypeId),
    Struct { type_name: String, members: Vec<crate::value::Value> },
    Vector { element_type: TypeId, items: Vec<crate::value::Value> },
    Dict { value_type: TypeId, entries: Vec<(String, crate::value::Value)> },
    Function(u32),
}

impl HeapData {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Json(_) => "json",
            Self::Typeid(_) => "typeid",
            Self::Struct { .. } => "struct",
            Self::Vector { .. } => "vector",
            Self::Dict { .. } => "dict",
            Self::Function(_) => "function",
        }
    }
}

#[derive(Debug)]
struct HeapObject {
    refcount: usize,
    data: HeapData,
}

/// Reference-counted arena backing every `ext` value. IDs are never reused
/// within a single execution; `clear()` resets the arena between runs
/// (spec.md §4.5 "the heap outlives no single program run").
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<Option<HeapObject>>,
}

impl Heap {
    pub fn allocate(&mut self, data: HeapData) -> HeapId {
        let id = self.objects.len();
        self.objects.push(Some(HeapObject { refcount: 1, data }));
        id
    }

    /// # Panics
    /// Panics if `id` is invalid or already freed.
    pub fn inc_ref(&mut self, id: HeapId) {
        self.slot_mut(id).refcount += 1;
    }

    /// Decrements the refcount, recursively freeing `id` and anything it
    /// owns once the count hits zero. Iterative (stack-based) so freeing a
    /// deep vector-of-vectors doesn't blow the native stack.
    ///
    /// # Panics
    /// Panics if `id` is invalid or already freed.
    pub fn dec_ref(&mut self, id: HeapId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let slot = self.objects.get_mut(current).expect("Heap::dec_ref: slot missing");
            let entry = slot.as_mut().expect("Heap::dec_ref: object already freed");
            if entry.refcount > 1 {
                entry.refcount -= 1;
                continue;
            }
            if let Some(object) = slot.take() {
                enqueue_children(&object.data, &mut stack);
            }
        }
    }

    /// # Panics
    /// Panics if `id` is invalid or already freed.
    #[must_use]
    pub fn get(&self, id: HeapId) -> &HeapData {
        &self
            .objects
            .get(id)
            .expect("Heap::get: slot missing")
            .as_ref()
            .expect("Heap::get: object already freed")
            .data
    }

    /// # Panics
    /// Panics if `id` is invalid or already freed.
    pub fn get_mut(&mut self, id: HeapId) -> &mut HeapData {
        &mut self
            .objects
            .get_mut(id)
            .expect("Heap::get_mut: slot missing")
            .as_mut()
            .expect("Heap::get_mut: object already freed")
            .data
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }

    fn slot_mut(&mut self, id: HeapId) -> &mut HeapObject {
        self.objects
            .get_mut(id)
            .expect("Heap: slot missing")
            .as_mut()
            .expect("Heap: object already freed")
    }
}

fn enqueue_children(data: &HeapData, stack: &mut Vec<HeapId>) {
    use crate::value::Value;
    let push_if_ref = |v: &Value, stack: &mut Vec<HeapId>| {
        if let Value::Ref(id) = v {
            stack.push(*id);
        }
    };
    match data {
        HeapData::Struct { members, .. } => members.iter().for_each(|v| push_if_ref(v, stack)),
        HeapData::Vector { items, .. } => items.iter().for_each(|v| push_if_ref(v, stack)),
        HeapData::Dict { entries, .. } => entries.iter().for_each(|(_, v)| push_if_ref(v, stack)),
        HeapData::String(_) | HeapData::Json(_) | HeapData::Typeid(_) | HeapData::Function(_) => {}
    }
}
