//! Sort orders for collections.

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::model::Model;
use crate::value::Value;

/// Ordering applied by [`Collection::sort`](crate::Collection::sort) and
/// after every `add`.
#[derive(Clone)]
pub enum Comparator {
    /// Sorts by an extracted key using [`Value::sort_cmp`].
    Key(Rc<dyn Fn(&Model) -> Value>),
    /// Full two-argument ordering.
    Full(Rc<dyn Fn(&Model, &Model) -> Ordering>),
}

impl Comparator {
    /// Sorts by a key extracted from each model.
    pub fn key<F>(extract: F) -> Self
    where
        F: Fn(&Model) -> Value + 'static,
    {
        Self::Key(Rc::new(extract))
    }

    /// Sorts with a two-argument ordering.
    pub fn full<F>(compare: F) -> Self
    where
        F: Fn(&Model, &Model) -> Ordering + 'static,
    {
        Self::Full(Rc::new(compare))
    }

    /// Sorts by the value of one attribute; absent values sort first.
    #[must_use]
    pub fn by_attribute(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::key(move |m| m.get(&name).unwrap_or_default())
    }

    /// Compares two models.
    #[must_use]
    pub fn compare(&self, a: &Model, b: &Model) -> Ordering {
        match self {
            Self::Key(extract) => extract(a).sort_cmp(&extract(b)),
            Self::Full(compare) => compare(a, b),
        }
    }

    /// Stable sort of `models`. Keys are extracted once per model.
    pub(crate) fn sort(&self, models: &mut Vec<Model>) {
        match self {
            Self::Key(extract) => {
                let mut keyed: Vec<(Value, Model)> =
                    models.drain(..).map(|m| (extract(&m), m)).collect();
                keyed.sort_by(|(a, _), (b, _)| a.sort_cmp(b));
                models.extend(keyed.into_iter().map(|(_, m)| m));
            }
            Self::Full(compare) => models.sort_by(|a, b| compare(a, b)),
        }
    }
}

impl fmt::Debug for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(_) => f.write_str("Comparator::Key"),
            Self::Full(_) => f.write_str("Comparator::Full"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs;

    fn models(ns: &[i64]) -> Vec<Model> {
        ns.iter().map(|n| Model::new(attrs! { "n" => *n }).unwrap()).collect()
    }

    fn ns(models: &[Model]) -> Vec<i64> {
        models
            .iter()
            .filter_map(|m| m.get("n").and_then(|v| v.as_int()))
            .collect()
    }

    #[test]
    fn test_key_sort() {
        let mut list = models(&[3, 1, 2]);
        Comparator::by_attribute("n").sort(&mut list);
        assert_eq!(ns(&list), vec![1, 2, 3]);
    }

    #[test]
    fn test_full_sort_descending() {
        let mut list = models(&[3, 1, 2]);
        Comparator::full(|a, b| {
            let n = |m: &Model| m.get("n").and_then(|v| v.as_int()).unwrap_or(0);
            n(b).cmp(&n(a))
        })
        .sort(&mut list);
        assert_eq!(ns(&list), vec![3, 2, 1]);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut list = vec![
            Model::new(attrs! { "k" => 1, "tag" => "a" }).unwrap(),
            Model::new(attrs! { "k" => 0, "tag" => "b" }).unwrap(),
            Model::new(attrs! { "k" => 1, "tag" => "c" }).unwrap(),
        ];
        Comparator::by_attribute("k").sort(&mut list);
        let tags: Vec<String> = list
            .iter()
            .filter_map(|m| m.get("tag").and_then(|v| v.as_str().map(str::to_string)))
            .collect();
        assert_eq!(tags, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_compare() {
        let list = models(&[1, 2]);
        let cmp = Comparator::by_attribute("n");
        assert_eq!(cmp.compare(&list[0], &list[1]), Ordering::Less);
    }
}
