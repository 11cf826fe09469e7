//! String lists
//!
//! Concatenation does not copy: the result references the fragments of
//! both operands. Comparisons walk fragments on either side as if each
//! operand were one contiguous buffer, so a list and a plain string with
//! the same bytes compare equal regardless of how the list was built.

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::value::Value;

/// Lazy concatenation of string fragments
#[derive(Clone)]
pub struct StringList {
    fragments: Rc<[Rc<[u8]>]>,
    len: usize,
}

impl StringList {
    /// Build a list from fragments (empty fragments are dropped)
    pub fn from_fragments(fragments: Vec<Rc<[u8]>>) -> Self {
        let fragments: Vec<Rc<[u8]>> = fragments.into_iter().filter(|f| !f.is_empty()).collect();
        let len = fragments.iter().map(|f| f.len()).sum();
        StringList {
            fragments: fragments.into(),
            len,
        }
    }

    /// Concatenate two string values
    ///
    /// Existing lists are flattened one level, so the result never nests.
    /// Non-string operands contribute nothing; callers convert first.
    pub fn concat(left: &Value, right: &Value) -> Self {
        let mut fragments = Vec::new();
        for v in [left, right] {
            match v {
                Value::Str(s) => fragments.push(s.shared().clone()),
                Value::StrList(l) => fragments.extend(l.fragments.iter().cloned()),
                _ => {}
            }
        }
        Self::from_fragments(fragments)
    }

    /// Total byte length
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fragment buffers in order
    pub fn fragments(&self) -> &[Rc<[u8]>] {
        &self.fragments
    }

    /// Materialize into one buffer
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for f in self.fragments.iter() {
            out.extend_from_slice(f);
        }
        out
    }
}

impl PartialEq for StringList {
    fn eq(&self, other: &Self) -> bool {
        StrView::List(self).eq_bytes(&StrView::List(other))
    }
}

impl fmt::Debug for StringList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.fragments.iter().map(|s| String::from_utf8_lossy(s)))
            .finish()
    }
}

/// Borrowed view over either string representation
#[derive(Debug, Clone, Copy)]
pub enum StrView<'a> {
    Plain(&'a [u8]),
    List(&'a StringList),
}

impl<'a> StrView<'a> {
    /// Total byte length
    pub fn len(&self) -> usize {
        match self {
            StrView::Plain(b) => b.len(),
            StrView::List(l) => l.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn chunk_count(&self) -> usize {
        match self {
            StrView::Plain(_) => 1,
            StrView::List(l) => l.fragments.len(),
        }
    }

    fn chunk(&self, index: usize) -> &'a [u8] {
        match *self {
            StrView::Plain(b) => b,
            StrView::List(l) => &l.fragments[index],
        }
    }

    /// Byte-wise comparison across fragment boundaries
    pub fn cmp_bytes(&self, other: &StrView<'_>) -> Ordering {
        let mut left = Cursor::default();
        let mut right = Cursor::default();

        loop {
            let a = left.remaining(self);
            let b = right.remaining(other);
            match (a, b) {
                (None, None) => return Ordering::Equal,
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (Some(a), Some(b)) => {
                    let n = a.len().min(b.len());
                    match a[..n].cmp(&b[..n]) {
                        Ordering::Equal => {
                            left.advance(n);
                            right.advance(n);
                        }
                        unequal => return unequal,
                    }
                }
            }
        }
    }

    /// Byte equality across fragment boundaries
    pub fn eq_bytes(&self, other: &StrView<'_>) -> bool {
        self.len() == other.len() && self.cmp_bytes(other) == Ordering::Equal
    }

    /// Materialize into one buffer
    pub fn to_vec(&self) -> Vec<u8> {
        match self {
            StrView::Plain(b) => b.to_vec(),
            StrView::List(l) => l.to_bytes(),
        }
    }
}

/// Position inside a fragmented string
#[derive(Default)]
struct Cursor {
    chunk: usize,
    offset: usize,
}

impl Cursor {
    /// Unread part of the current chunk, skipping exhausted chunks
    fn remaining<'a>(&mut self, view: &StrView<'a>) -> Option<&'a [u8]> {
        while self.chunk < view.chunk_count() {
            let chunk = view.chunk(self.chunk);
            if self.offset < chunk.len() {
                return Some(&chunk[self.offset..]);
            }
            self.chunk += 1;
            self.offset = 0;
        }
        None
    }

    fn advance(&mut self, n: usize) {
        self.offset += n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(parts: &[&str]) -> StringList {
        StringList::from_fragments(parts.iter().map(|p| Rc::from(p.as_bytes())).collect())
    }

    #[test]
    fn test_concat_flattens() {
        let ab = StringList::concat(&Value::str("A"), &Value::str("B"));
        let abc = StringList::concat(&Value::StrList(ab), &Value::str("C"));
        assert_eq!(abc.fragments().len(), 3);
        assert_eq!(abc.len(), 3);
        assert_eq!(abc.to_bytes(), b"ABC");
    }

    #[test]
    fn test_four_comparison_cases() {
        let l1 = list(&["A", "BC"]);
        let l2 = list(&["AB", "C"]);
        let plain: &[u8] = b"ABC";

        // list x list
        assert!(StrView::List(&l1).eq_bytes(&StrView::List(&l2)));
        // list x plain
        assert!(StrView::List(&l1).eq_bytes(&StrView::Plain(plain)));
        // plain x list
        assert!(StrView::Plain(plain).eq_bytes(&StrView::List(&l2)));
        // plain x plain
        assert!(StrView::Plain(plain).eq_bytes(&StrView::Plain(b"ABC")));
    }

    #[test]
    fn test_ordering_across_fragments() {
        let l = list(&["ab", "c"]);
        assert_eq!(StrView::List(&l).cmp_bytes(&StrView::Plain(b"abd")), Ordering::Less);
        assert_eq!(StrView::List(&l).cmp_bytes(&StrView::Plain(b"ab")), Ordering::Greater);
        assert_eq!(StrView::Plain(b"").cmp_bytes(&StrView::List(&l)), Ordering::Less);
        assert!(!StrView::List(&l).eq_bytes(&StrView::Plain(b"abx")));
    }

    #[test]
    fn test_empty_fragments_skipped() {
        let l = list(&["", "x", ""]);
        assert_eq!(l.fragments().len(), 1);
        assert_eq!(l, list(&["x"]));
    }
}
