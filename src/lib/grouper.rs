//! Grouping of consecutive equal-keyed items.
//!
//! The spill sorter returns records ordered by template name; [`EqualKeyGrouper`]
//! turns that stream into maximal runs of records sharing a name, so each run holds
//! every spilled record of one template.

use anyhow::Result;
use std::iter::{FusedIterator, Peekable};

use crate::record::Record;

/// An iterator adapter that yields maximal runs of consecutive items for which
/// `same_group(first_of_run, item)` holds.
///
/// Items are moved from the source into the groups, never cloned. Errors from the
/// source are yielded once, in order, after which the grouper is exhausted.
///
/// # Example
///
/// ```
/// use bamfq_lib::grouper::EqualKeyGrouper;
///
/// let input = vec![1, 1, 2, 3, 3, 3].into_iter().map(Ok::<_, anyhow::Error>);
/// let groups: Vec<Vec<i32>> =
///     EqualKeyGrouper::new(input, |a: &i32, b: &i32| a == b).map(Result::unwrap).collect();
///
/// assert_eq!(groups, vec![vec![1, 1], vec![2], vec![3, 3, 3]]);
/// ```
pub struct EqualKeyGrouper<I, T, F>
where
    I: Iterator<Item = Result<T>>,
{
    source: Peekable<I>,
    same_group: F,
    done: bool,
}

impl<I, T, F> EqualKeyGrouper<I, T, F>
where
    I: Iterator<Item = Result<T>>,
    F: FnMut(&T, &T) -> bool,
{
    /// Create a new grouper over `source` using the `same_group` predicate.
    pub fn new(source: I, same_group: F) -> Self {
        Self { source: source.peekable(), same_group, done: false }
    }
}

impl<I, T, F> Iterator for EqualKeyGrouper<I, T, F>
where
    I: Iterator<Item = Result<T>>,
    F: FnMut(&T, &T) -> bool,
{
    type Item = Result<Vec<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let first = match self.source.next() {
            Some(Ok(item)) => item,
            Some(Err(e)) => {
                self.done = true;
                return Some(Err(e));
            }
            None => {
                self.done = true;
                return None;
            }
        };

        let mut group = Vec::with_capacity(2);
        group.push(first);
        let same_group = &mut self.same_group;
        // A pending error stays in the source and surfaces on the next call
        loop {
            let next =
                self.source.next_if(|next| next.as_ref().is_ok_and(|n| same_group(&group[0], n)));
            match next {
                Some(Ok(item)) => group.push(item),
                _ => break,
            }
        }
        Some(Ok(group))
    }
}

impl<I, T, F> FusedIterator for EqualKeyGrouper<I, T, F>
where
    I: Iterator<Item = Result<T>>,
    F: FnMut(&T, &T) -> bool,
{
}

/// Groups a name-ordered record stream into runs of records with equal names.
pub fn group_by_name<I>(records: I) -> EqualKeyGrouper<I, Record, fn(&Record, &Record) -> bool>
where
    I: Iterator<Item = Result<Record>>,
{
    EqualKeyGrouper::new(records, same_name)
}

fn same_name(a: &Record, b: &Record) -> bool {
    a.name() == b.name()
}
