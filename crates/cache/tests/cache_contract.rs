//! The slot-cache contract, run against every local implementation

use blobio_cache::{
    Cache, CacheConfig, CacheError, CacheState, FileCache, FreezeReason, MultiprocessFileCache,
    NaiveCache,
};
use proptest::prelude::*;
use rstest::rstest;
use tempfile::TempDir;

#[derive(Debug, Clone, Copy)]
enum Kind {
    Naive,
    File,
    Multiprocess,
}

fn make(kind: Kind, length: usize, dir: &TempDir) -> Box<dyn Cache> {
    let config = CacheConfig::builder()
        .cache_dir(dir.path())
        .multithread_safe(true)
        .build()
        .unwrap();

    match kind {
        Kind::Naive => Box::new(NaiveCache::new(length, true).unwrap()),
        Kind::File => Box::new(FileCache::new(length, &config).unwrap()),
        Kind::Multiprocess => Box::new(MultiprocessFileCache::new(length, &config).unwrap()),
    }
}

#[rstest]
#[case::naive(Kind::Naive)]
#[case::file(Kind::File)]
#[case::multiprocess(Kind::Multiprocess)]
fn round_trip(#[case] kind: Kind) {
    let dir = TempDir::new().unwrap();
    let cache = make(kind, 16, &dir);

    for i in 0..16 {
        assert_eq!(cache.get(i).unwrap(), None);
    }
    for i in 0..16 {
        let payload: Vec<u8> = (0..i * 7).map(|b| b as u8).collect();
        assert!(cache.put(i, &payload).unwrap());
    }
    for i in 0..16 {
        let payload: Vec<u8> = (0..i * 7).map(|b| b as u8).collect();
        assert_eq!(cache.get(i).unwrap().unwrap(), payload);
    }
    assert_eq!(cache.len(), 16);
}

#[rstest]
#[case::naive(Kind::Naive)]
#[case::file(Kind::File)]
#[case::multiprocess(Kind::Multiprocess)]
fn write_once(#[case] kind: Kind) {
    let dir = TempDir::new().unwrap();
    let cache = make(kind, 4, &dir);

    assert!(cache.put(2, b"d1").unwrap());
    assert!(!cache.put(2, b"d2").unwrap());
    assert_eq!(cache.get(2).unwrap().unwrap(), &b"d1"[..]);
}

#[rstest]
#[case::naive(Kind::Naive)]
#[case::file(Kind::File)]
#[case::multiprocess(Kind::Multiprocess)]
fn out_of_range(#[case] kind: Kind) {
    let dir = TempDir::new().unwrap();
    let cache = make(kind, 4, &dir);

    for index in [4, 5, usize::MAX] {
        assert!(matches!(
            cache.get(index),
            Err(CacheError::IndexOutOfRange { length: 4, .. })
        ));
        assert!(matches!(
            cache.put(index, b"x"),
            Err(CacheError::IndexOutOfRange { .. })
        ));
    }
}

#[rstest]
#[case::naive(Kind::Naive)]
#[case::file(Kind::File)]
#[case::multiprocess(Kind::Multiprocess)]
fn closed_cache_is_inert(#[case] kind: Kind) {
    let dir = TempDir::new().unwrap();
    let cache = make(kind, 2, &dir);

    cache.put(0, b"kept").unwrap();
    cache.close().unwrap();
    assert_eq!(cache.state(), CacheState::Closed);
    assert_eq!(cache.get(0).unwrap(), None);
    assert!(!cache.put(1, b"late").unwrap());
}

#[test]
fn zero_length_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = CacheConfig::builder().cache_dir(dir.path()).build().unwrap();

    assert!(matches!(
        NaiveCache::new(0, false),
        Err(CacheError::Configuration { .. })
    ));
    assert!(matches!(
        FileCache::new(0, &config),
        Err(CacheError::Configuration { .. })
    ));
    assert!(matches!(
        MultiprocessFileCache::new(0, &config),
        Err(CacheError::Configuration { .. })
    ));
}

#[test]
fn get_and_cache_fetches_on_miss_only() {
    let dir = TempDir::new().unwrap();
    let config = CacheConfig::builder().cache_dir(dir.path()).build().unwrap();
    let cache = FileCache::new(4, &config).unwrap();

    let mut calls = 0;
    let first: Result<_, CacheError> = cache.get_and_cache(1, |i| {
        calls += 1;
        Ok(format!("sample {i}").into_bytes())
    });
    assert_eq!(first.unwrap(), &b"sample 1"[..]);

    let second: Result<_, CacheError> = cache.get_and_cache(1, |_| {
        calls += 1;
        Ok(Vec::new())
    });
    assert_eq!(second.unwrap(), &b"sample 1"[..]);
    assert_eq!(calls, 1);
}

#[test]
fn get_and_cache_propagates_fetch_errors() {
    #[derive(Debug)]
    enum LoaderError {
        Backend(&'static str),
        Cache(CacheError),
    }

    impl From<CacheError> for LoaderError {
        fn from(error: CacheError) -> Self {
            LoaderError::Cache(error)
        }
    }

    let cache = NaiveCache::new(2, false).unwrap();
    let result: Result<_, LoaderError> =
        cache.get_and_cache(0, |_| Err(LoaderError::Backend("connection reset")));
    assert!(matches!(result, Err(LoaderError::Backend("connection reset"))));
    assert_eq!(cache.get(0).unwrap(), None);

    let result: Result<_, LoaderError> = cache.get_and_cache(9, |_| Ok(Vec::new()));
    assert!(matches!(
        result,
        Err(LoaderError::Cache(CacheError::IndexOutOfRange { .. }))
    ));
}

#[rstest]
#[case::file(Kind::File)]
#[case::multiprocess(Kind::Multiprocess)]
fn size_limit_freezes(#[case] kind: Kind) {
    let dir = TempDir::new().unwrap();
    let config = CacheConfig::builder()
        .cache_dir(dir.path())
        .cache_size_limit(100)
        .build()
        .unwrap();
    let cache: Box<dyn Cache> = match kind {
        Kind::File => Box::new(FileCache::new(10, &config).unwrap()),
        _ => Box::new(MultiprocessFileCache::new(10, &config).unwrap()),
    };

    for i in 0..3 {
        assert!(cache.put(i, &[i as u8; 30]).unwrap());
    }
    // 90 + 30 > 100
    assert!(!cache.put(3, &[3; 30]).unwrap());
    assert_eq!(cache.state(), CacheState::Frozen(FreezeReason::SizeLimit));

    // Fits the remaining 10 bytes, still refused
    assert!(!cache.put(4, &[4; 5]).unwrap());
    for i in 0..3 {
        assert_eq!(cache.get(i).unwrap().unwrap(), vec![i as u8; 30]);
    }
    assert_eq!(cache.get(3).unwrap(), None);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn file_cache_stores_arbitrary_payloads(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..512), 1..24)
    ) {
        let dir = TempDir::new().unwrap();
        let config = CacheConfig::builder().cache_dir(dir.path()).build().unwrap();
        let cache = FileCache::new(payloads.len(), &config).unwrap();

        for (i, payload) in payloads.iter().enumerate().rev() {
            prop_assert!(cache.put(i, payload).unwrap());
        }
        for (i, payload) in payloads.iter().enumerate() {
            prop_assert_eq!(cache.get(i).unwrap().unwrap(), payload.clone());
        }
    }
}
