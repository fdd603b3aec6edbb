// ABOUTME: Resource limits guarding the loader against oversized or deeply nested input.
// ABOUTME: Measures encoded size and nesting depth of a plain tree without recursion.

use std::io;

use serde_json::Value;

/// Default upper bound on the size of one input document, in bytes.
pub const DEFAULT_MAX_INPUT_SIZE: usize = 16 * 1024 * 1024;

/// Default upper bound on nesting, counted as one level per list or mapping.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Nesting depth of a plain tree: scalars are 0, each list or mapping
/// boundary adds one. Stops early once `limit` is exceeded and returns
/// `limit + 1`, so hostile input is never walked in full.
pub fn depth_exceeding(value: &Value, limit: usize) -> usize {
    let mut deepest = 0;
    let mut stack: Vec<(&Value, usize)> = vec![(value, 0)];

    while let Some((v, depth)) = stack.pop() {
        if !(v.is_array() || v.is_object()) {
            continue;
        }
        let level = depth + 1;
        if level > limit {
            return limit + 1;
        }
        deepest = deepest.max(level);
        match v {
            Value::Array(items) => stack.extend(items.iter().map(|c| (c, level))),
            Value::Object(map) => stack.extend(map.values().map(|c| (c, level))),
            _ => {}
        }
    }

    deepest
}

/// True if the tree nests deeper than `max_depth`.
pub fn exceeds_depth(value: &Value, max_depth: usize) -> bool {
    depth_exceeding(value, max_depth) > max_depth
}

/// Size of the compact JSON encoding of `value`, computed without allocating
/// the encoded text.
pub fn encoded_size(value: &Value) -> usize {
    let mut counter = ByteCounter(0);
    // Writing into a counter cannot fail for a well-formed Value.
    let _ = serde_json::to_writer(&mut counter, value);
    counter.0
}

struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
