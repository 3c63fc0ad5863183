use crate::{prefix_end_bytes, KvStore};
use anyhow::Result;
use idreg_types::{PageRequest, PageResponse};

/// Entries a single filtered walk may examine before it stops and hands back
/// a continuation key.
pub const DEFAULT_MAX_SCAN_ENTRIES: usize = 10_000;

const SCAN_BATCH: usize = 256;

/// Page through every entry under `prefix`.
pub fn paginate<T, F>(
    store: &dyn KvStore,
    prefix: &[u8],
    page: &PageRequest,
    mut decode: F,
) -> Result<(Vec<T>, PageResponse)>
where
    F: FnMut(&[u8], &[u8]) -> Result<T>,
{
    filtered_paginate(store, prefix, page, DEFAULT_MAX_SCAN_ENTRIES, |k, v| {
        decode(k, v).map(Some)
    })
}

/// Page through the entries under `prefix` for which `filter` yields a value.
///
/// Keys handed to `filter` and returned in `next_key` are relative to
/// `prefix`. At most `max_examined` entries are read; when that budget runs
/// out `next_key` names the first entry not yet examined so the caller can
/// resume. `total` is only filled in when requested and the walk reached the
/// end of the prefix.
pub fn filtered_paginate<T, F>(
    store: &dyn KvStore,
    prefix: &[u8],
    page: &PageRequest,
    max_examined: usize,
    mut filter: F,
) -> Result<(Vec<T>, PageResponse)>
where
    F: FnMut(&[u8], &[u8]) -> Result<Option<T>>,
{
    let limit = page.effective_limit() as usize;
    let mut to_skip = if page.key.is_some() { 0 } else { page.offset };
    let end = prefix_end_bytes(prefix);
    let mut cursor = [prefix, page.key.as_deref().unwrap_or_default()].concat();

    let mut items = Vec::new();
    let mut next_key = None;
    let mut matched = 0u64;
    let mut examined = 0usize;
    let mut complete = false;

    'walk: loop {
        let batch = store.range(&cursor, end.as_deref(), Some(SCAN_BATCH))?;
        let exhausted = batch.len() < SCAN_BATCH;
        for (key, value) in &batch {
            let rel = &key[prefix.len()..];
            if examined >= max_examined {
                if next_key.is_none() {
                    next_key = Some(rel.to_vec());
                }
                break 'walk;
            }
            examined += 1;

            let Some(item) = filter(rel, value)? else {
                continue;
            };
            matched += 1;
            if to_skip > 0 {
                to_skip -= 1;
                continue;
            }
            if items.len() < limit {
                items.push(item);
                continue;
            }
            if next_key.is_none() {
                next_key = Some(rel.to_vec());
            }
            if !page.count_total {
                break 'walk;
            }
        }
        if exhausted {
            complete = true;
            break;
        }
        if let Some((last, _)) = batch.last() {
            cursor = last.clone();
            cursor.push(0);
        }
    }

    let total = (page.count_total && complete).then_some(matched);
    Ok((items, PageResponse { next_key, total }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    fn store_with(n: u8) -> MemoryStore {
        let store = MemoryStore::default();
        for i in 0..n {
            store.set(&[b'p', i], &[i]).unwrap();
        }
        store.set(b"q", b"outside").unwrap();
        store
    }

    fn even(_: &[u8], v: &[u8]) -> Result<Option<u8>> {
        Ok((v[0] % 2 == 0).then_some(v[0]))
    }

    #[test]
    fn pages_resume_from_next_key() {
        let store = store_with(10);
        let (first, resp) = paginate(&store, b"p", &PageRequest::with_limit(4), |_, v| Ok(v[0])).unwrap();
        assert_eq!(first, vec![0, 1, 2, 3]);
        let next = resp.next_key.unwrap();
        assert_eq!(next, vec![4]);

        let (rest, resp) = paginate(&store, b"p", &PageRequest::after(next, 100), |_, v| Ok(v[0])).unwrap();
        assert_eq!(rest, vec![4, 5, 6, 7, 8, 9]);
        assert_eq!(resp.next_key, None);
    }

    #[test]
    fn offset_and_total_count_matches_only() {
        let store = store_with(10);
        let page = PageRequest {
            offset: 1,
            limit: 2,
            count_total: true,
            ..Default::default()
        };
        let (items, resp) = filtered_paginate(&store, b"p", &page, 100, even).unwrap();
        assert_eq!(items, vec![2, 4]);
        assert_eq!(resp.next_key, Some(vec![6]));
        assert_eq!(resp.total, Some(5));
    }

    #[test]
    fn exhausted_budget_returns_continuation() {
        let store = store_with(10);
        let (items, resp) = filtered_paginate(&store, b"p", &PageRequest::default(), 3, even).unwrap();
        assert_eq!(items, vec![0, 2]);
        assert_eq!(resp.next_key, Some(vec![3]));
        assert_eq!(resp.total, None);
    }

    #[test]
    fn walks_past_batch_boundaries() {
        let store = MemoryStore::default();
        for i in 0..600u16 {
            store.set(&[b'p', (i >> 8) as u8, i as u8], &i.to_be_bytes()).unwrap();
        }
        let page = PageRequest {
            limit: 1_000,
            count_total: true,
            ..Default::default()
        };
        let (items, resp) = paginate(&store, b"p", &page, |_, v| Ok(v.to_vec())).unwrap();
        assert_eq!(items.len(), 600);
        assert_eq!(resp.total, Some(600));
        assert_eq!(resp.next_key, None);
    }
}
