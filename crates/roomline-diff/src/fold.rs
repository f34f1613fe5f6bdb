//! Fuses adjacent add/delete runs in an SES stream into `replaced` edits
//! (§4.2), collapsing the common "human replaced line L with L′" shape
//! (SES reports delete+add) into one structural edit.

use crate::ses::DiffTag;

/// One element of the folded stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FoldedTag<T> {
    Common(T),
    Deleted(T),
    Added(T),
    Replaced { value: T, old_value: T },
}

/// Folds an SES script, eagerly (see `ses` module doc for why "lazy" means
/// "built once" on stable Rust).
pub fn fold<T: Clone>(script: impl IntoIterator<Item = DiffTag<T>>) -> Vec<FoldedTag<T>> {
    let mut output = Vec::new();
    let mut s0: Vec<DiffTag<T>> = Vec::new();
    let mut s1: Vec<DiffTag<T>> = Vec::new();

    for item in script {
        match item {
            DiffTag::Common(v) => {
                flush(&mut s0, &mut s1, &mut output);
                output.push(FoldedTag::Common(v));
            }
            add_or_del => stage(add_or_del, &mut s0, &mut s1, &mut output),
        }
    }
    flush(&mut s0, &mut s1, &mut output);
    output
}

fn same_kind<T>(a: &DiffTag<T>, b: &DiffTag<T>) -> bool {
    matches!(
        (a, b),
        (DiffTag::Added(_), DiffTag::Added(_)) | (DiffTag::Deleted(_), DiffTag::Deleted(_))
    )
}

fn stage<T: Clone>(
    item: DiffTag<T>,
    s0: &mut Vec<DiffTag<T>>,
    s1: &mut Vec<DiffTag<T>>,
    output: &mut Vec<FoldedTag<T>>,
) {
    if s0.is_empty() {
        s0.push(item);
        return;
    }

    if same_kind(s0.last().expect("checked non-empty"), &item) {
        if !s1.is_empty() {
            flush(s0, s1, output);
        }
        s0.push(item);
    } else {
        s1.push(item);
    }
}

fn as_is<T>(item: DiffTag<T>) -> FoldedTag<T> {
    match item {
        DiffTag::Added(v) => FoldedTag::Added(v),
        DiffTag::Deleted(v) => FoldedTag::Deleted(v),
        DiffTag::Common(v) => FoldedTag::Common(v),
    }
}

fn pair<T>(a: DiffTag<T>, b: DiffTag<T>) -> FoldedTag<T> {
    match (a, b) {
        (DiffTag::Added(value), DiffTag::Deleted(old_value)) => {
            FoldedTag::Replaced { value, old_value }
        }
        (DiffTag::Deleted(old_value), DiffTag::Added(value)) => {
            FoldedTag::Replaced { value, old_value }
        }
        _ => unreachable!("staging only ever pairs one added with one deleted"),
    }
}

fn flush<T>(s0: &mut Vec<DiffTag<T>>, s1: &mut Vec<DiffTag<T>>, output: &mut Vec<FoldedTag<T>>) {
    let n0 = s0.len();
    let n1 = s1.len();

    if n0 > n1 {
        let keep = n0 - n1;
        let paired: Vec<_> = s0.drain(keep..).collect();
        for item in s0.drain(..) {
            output.push(as_is(item));
        }
        for (a, b) in paired.into_iter().zip(s1.drain(..)) {
            output.push(pair(a, b));
        }
    } else {
        let head: Vec<_> = s1.drain(..n0).collect();
        for (a, b) in s0.drain(..).zip(head) {
            output.push(pair(a, b));
        }
        for item in s1.drain(..) {
            output.push(as_is(item));
        }
    }
}
