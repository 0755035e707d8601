//! Stack frame open/close (spec.md §3 "Stack frame", §4.4 "Open frame ...
//! Close frame"). A frame is just its slots; teardown drops only the slots
//! the compiler marked `ext`, per `FrameLayout::ext_bits`.

use crate::bytecode::FrameLayout;
use crate::heap::Heap;
use crate::value::Value;

pub fn open(layout: &FrameLayout) -> Vec<Value> {
    (0..layout.len()).map(|_| Value::Undefined).collect()
}

pub fn close(slots: Vec<Value>, layout: &FrameLayout, heap: &mut Heap) {
    for (slot, is_ext) in slots.into_iter().zip(&layout.ext_bits) {
        if *is_ext {
            slot.drop_with_heap(heap);
        }
    }
}
