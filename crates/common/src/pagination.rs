/// 基于 marker 的分页游标
///
/// 所有列表（IpBlock、IpAddress、NAT 关联）共用同一套游标语义：
/// marker 是上一页最后一条记录的 id，下一页严格从该记录之后开始；
/// 排序键由 [`SortOrder`] 参数化。

use serde::{Deserialize, Serialize};

/// 未指定 limit 时的默认页大小上限
pub const DEFAULT_MAX_LIMIT: u64 = 100;

/// 带有稳定、单调递增 id 的记录
pub trait Identified {
    fn id(&self) -> i64;
}

/// 排序方式
pub trait SortOrder<T> {
    type Key: Ord + Copy + std::fmt::Debug;

    fn key(item: &T) -> Self::Key;

    /// marker 对应的记录已不在查询范围内时，能否仅凭 id 推出排序位置
    fn key_from_marker(marker: i64) -> Option<Self::Key>;
}

/// 按 id（创建顺序）升序
pub struct ById;

impl<T: Identified> SortOrder<T> for ById {
    type Key = i64;

    fn key(item: &T) -> i64 {
        item.id()
    }

    fn key_from_marker(marker: i64) -> Option<i64> {
        Some(marker)
    }
}

/// 分页起点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Start<K> {
    Beginning,
    After(K),
    /// marker 无法定位，结果为空页
    Exhausted,
}

/// 分页请求
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub marker: Option<i64>,
    pub limit: Option<u64>,
}

impl PageRequest {
    pub fn new(marker: Option<i64>, limit: Option<u64>) -> Self {
        Self { marker, limit }
    }

    pub fn first(limit: u64) -> Self {
        Self::new(None, Some(limit))
    }

    pub fn after(marker: i64, limit: u64) -> Self {
        Self::new(Some(marker), Some(limit))
    }

    /// 实际页大小：缺省取上限，超出上限时截断；`limit = 0` 得到空页
    pub fn effective_limit(&self, max_limit: u64) -> u64 {
        let max_limit = max_limit.max(1);
        self.limit.map_or(max_limit, |limit| limit.min(max_limit))
    }

    /// 根据 marker 记录计算起点
    ///
    /// `marker_item` 是调用方在查询范围内按 marker 找到的记录（若有）。
    pub fn start<T, O>(&self, marker_item: Option<&T>) -> Start<O::Key>
    where
        T: Identified,
        O: SortOrder<T>,
    {
        let Some(marker) = self.marker else {
            return Start::Beginning;
        };

        match marker_item.filter(|item| item.id() == marker) {
            Some(item) => Start::After(O::key(item)),
            None => O::key_from_marker(marker).map_or(Start::Exhausted, Start::After),
        }
    }
}

/// 分页结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 还有后续记录时为本页最后一条的 id
    pub next_marker: Option<i64>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_marker: None,
        }
    }
}

impl<T: Identified> Page<T> {
    /// 由多取一条的查询结果构造分页
    ///
    /// `rows` 已按排序键升序、位于起点之后，且最多 `limit + 1` 条。
    pub fn from_overfetch(mut rows: Vec<T>, limit: u64) -> Self {
        let has_more = rows.len() as u64 > limit;
        rows.truncate(limit as usize);

        let next_marker = if has_more {
            rows.last().map(Identified::id)
        } else {
            None
        };

        Self {
            items: rows,
            next_marker,
        }
    }
}

/// 对内存中的集合分页
pub fn paginate<T, O>(items: impl IntoIterator<Item = T>, request: &PageRequest, max_limit: u64) -> Page<T>
where
    T: Identified,
    O: SortOrder<T>,
{
    let mut sorted: Vec<T> = items.into_iter().collect();
    sorted.sort_by_key(|item| (O::key(item), item.id()));

    let marker_item = request
        .marker
        .and_then(|marker| sorted.iter().find(|item| item.id() == marker));

    let limit = request.effective_limit(max_limit);
    if limit == 0 {
        return Page::empty();
    }

    let rows: Vec<T> = match request.start::<T, O>(marker_item) {
        Start::Exhausted => return Page::empty(),
        Start::Beginning => sorted,
        Start::After(key) => sorted.into_iter().filter(|item| O::key(item) > key).collect(),
    };

    Page::from_overfetch(rows.into_iter().take(limit as usize + 1).collect(), limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: i64,
        value: u32,
    }

    impl Identified for Item {
        fn id(&self) -> i64 {
            self.id
        }
    }

    struct ByValue;

    impl SortOrder<Item> for ByValue {
        type Key = u32;

        fn key(item: &Item) -> u32 {
            item.value
        }

        fn key_from_marker(_marker: i64) -> Option<u32> {
            None
        }
    }

    fn items(n: i64) -> Vec<Item> {
        (1..=n).map(|id| Item { id, value: (100 - id) as u32 }).collect()
    }

    #[test]
    fn test_default_limit() {
        assert_eq!(PageRequest::default().effective_limit(100), 100);
        assert_eq!(PageRequest::first(500).effective_limit(100), 100);
        assert_eq!(PageRequest::first(0).effective_limit(100), 0);
    }

    #[test]
    fn test_zero_limit_returns_empty_page() {
        let page = paginate::<_, ById>(items(3), &PageRequest::first(0), 100);
        assert_eq!(page, Page::empty());

        let page = paginate::<_, ById>(items(3), &PageRequest::after(1, 0), 100);
        assert_eq!(page, Page::empty());
    }

    #[test]
    fn test_marker_starts_strictly_after() {
        let page = paginate::<_, ById>(items(4), &PageRequest::after(2, 2), 100);
        let ids: Vec<i64> = page.items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![3, 4]);
        assert_eq!(page.next_marker, None);
    }

    #[test]
    fn test_remainder_without_error() {
        let page = paginate::<_, ById>(items(3), &PageRequest::first(10), 100);
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.next_marker, None);
    }

    #[test]
    fn test_pages_concatenate_to_full_collection() {
        for limit in 1..=7 {
            let all = items(10);
            let mut seen = Vec::new();
            let mut request = PageRequest::first(limit);

            loop {
                let page = paginate::<_, ByValue>(all.clone(), &request, 100);
                seen.extend(page.items.iter().map(|i| i.id));
                match page.next_marker {
                    Some(marker) => request = PageRequest::after(marker, limit),
                    None => break,
                }
            }

            let expected: Vec<i64> = (1..=10).rev().collect();
            assert_eq!(seen, expected, "limit={}", limit);
        }
    }

    #[test]
    fn test_missing_marker() {
        // 按 id 排序时可以直接从 id 之后继续
        let page = paginate::<_, ById>(items(4), &PageRequest::after(10, 2), 100);
        assert!(page.items.is_empty());
        let page = paginate::<_, ById>(vec![Item { id: 5, value: 0 }], &PageRequest::after(3, 2), 100);
        assert_eq!(page.items.len(), 1);

        // 按值排序时无法定位
        let page = paginate::<_, ByValue>(items(4), &PageRequest::after(42, 2), 100);
        assert_eq!(page, Page::empty());
    }
}
