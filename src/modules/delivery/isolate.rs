/// Continue-on-error combinator cho fan-out loops: lỗi của một item được
/// log và nuốt, các item sau vẫn chạy. Trả về số item thành công.
use std::future::Future;

use crate::api::error;

pub async fn for_each_isolated<T, F, Fut>(items: Vec<T>, context: &str, mut op: F) -> usize
where
    T: Clone + std::fmt::Debug,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<(), error::SystemError>>,
{
    let mut succeeded = 0;

    for item in items {
        match op(item.clone()).await {
            Ok(()) => succeeded += 1,
            Err(e) => {
                tracing::warn!("{context}: processing {item:?} failed: {e}");
            }
        }
    }

    succeeded
}
