//! In-place quicksort with an explicit index stack.
//!
//! Header and query canonicalization sort caller-controlled input. Recursing
//! on that input would let its shape decide how deep the call stack grows, so
//! pending ranges live in a fixed array instead.

use std::cmp::Ordering;

use crate::config::WORST_CASE_SORT_STACK_SIZE;

/// Sort `items` in place using `compare`.
///
/// Uses Lomuto partitioning with the last element as pivot. The smaller
/// partition is always processed first, which bounds the number of pending
/// ranges to `log2(n) + 1`. The sort is not stable; callers that need a
/// deterministic order among equal keys must break ties in `compare`.
///
/// # Examples
///
/// ```
/// use rustack_sigv4::sort::quick_sort;
///
/// let mut values = [5, 1, 4, 2, 3];
/// quick_sort(&mut values, |a, b| a.cmp(b));
/// assert_eq!(values, [1, 2, 3, 4, 5]);
/// ```
pub fn quick_sort<T, F>(items: &mut [T], mut compare: F)
where
    F: FnMut(&T, &T) -> Ordering,
{
    if items.len() < 2 {
        return;
    }

    let mut stack = [0usize; WORST_CASE_SORT_STACK_SIZE];
    stack[0] = 0;
    stack[1] = items.len() - 1;
    let mut top = 2;

    while top > 0 {
        top -= 2;
        let (low, high) = (stack[top], stack[top + 1]);

        let pivot = partition(items, low, high, &mut compare);

        // Ranges are inclusive; only ranges of two or more need work.
        let left = (pivot - low > 1).then(|| (low, pivot - 1));
        let right = (high - pivot > 1).then(|| (pivot + 1, high));

        let (larger, smaller) = if pivot - low >= high - pivot {
            (left, right)
        } else {
            (right, left)
        };

        for (lo, hi) in [larger, smaller].into_iter().flatten() {
            stack[top] = lo;
            stack[top + 1] = hi;
            top += 2;
        }
    }
}

fn partition<T, F>(items: &mut [T], low: usize, high: usize, compare: &mut F) -> usize
where
    F: FnMut(&T, &T) -> Ordering,
{
    let mut store = low;
    for j in low..high {
        if compare(&items[j], &items[high]) == Ordering::Less {
            items.swap(store, j);
            store += 1;
        }
    }
    items.swap(store, high);
    store
}
