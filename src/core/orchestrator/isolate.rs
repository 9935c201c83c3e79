//! Loop-and-continue combinators. Every item is attempted in order and its
//! failure is recorded next to the successes instead of aborting the loop.

use std::future::Future;

use anyhow::Result;

/// Sequentially map `items` through `f`, collecting one `Result` per item.
pub async fn map_isolated<T, R, F, Fut>(items: impl IntoIterator<Item = T>, mut f: F) -> Vec<Result<R>>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<R>>,
{
    let mut out = Vec::new();
    for item in items {
        out.push(f(item).await);
    }
    out
}

/// Like [`map_isolated`] but threads an accumulator through the items. The
/// step function hands the accumulator back together with the item's result,
/// so a failed item still yields the state the next item starts from.
pub async fn fold_isolated<T, A, R, F, Fut>(
    items: impl IntoIterator<Item = T>,
    init: A,
    mut f: F,
) -> (A, Vec<Result<R>>)
where
    F: FnMut(A, T) -> Fut,
    Fut: Future<Output = (A, Result<R>)>,
{
    let mut acc = init;
    let mut out = Vec::new();
    for item in items {
        let (next, result) = f(acc, item).await;
        acc = next;
        out.push(result);
    }
    (acc, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[tokio::test]
    async fn map_keeps_going_after_a_failure() {
        let results = map_isolated(1..=4, |n| async move {
            if n == 2 {
                Err(anyhow!("two is unlucky"))
            } else {
                Ok(n * 10)
            }
        })
        .await;

        assert_eq!(results.len(), 4);
        assert_eq!(results[0].as_ref().ok(), Some(&10));
        assert!(results[1].is_err());
        assert_eq!(results[3].as_ref().ok(), Some(&40));
    }

    #[tokio::test]
    async fn fold_threads_state_through_failures() {
        let (sum, results) = fold_isolated(vec![1, 2, 3], 0, |acc, n| async move {
            if n == 2 {
                (acc, Err(anyhow!("skip")))
            } else {
                (acc + n, Ok(n))
            }
        })
        .await;

        assert_eq!(sum, 4);
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 2);
    }

    #[tokio::test]
    async fn empty_input_yields_initial_state() {
        let (acc, results) =
            fold_isolated(Vec::<u8>::new(), "start", |acc, _| async move { (acc, Ok(())) }).await;
        assert_eq!(acc, "start");
        assert!(results.is_empty());
    }
}
