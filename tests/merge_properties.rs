//! Property tests for the merge laws: exact unread counter, retention cap,
//! newest-first ordering, and idempotent re-polls.

use proptest::prelude::*;
use rssreader::engine::merge_feed;
use rssreader::storage::{Article, Feed, FetchedFeed};

#[derive(Debug, Clone)]
struct Case {
    stored: Vec<Article>,
    new: Vec<Article>,
    overlap: usize,
    cap: usize,
}

impl Case {
    fn fetched(&self) -> FetchedFeed {
        let mut articles: Vec<Article> = self.new.clone();
        articles.extend(self.stored.iter().take(self.overlap).map(|a| Article {
            read: None,
            ..a.clone()
        }));
        FetchedFeed::new("Fetched", articles)
    }

    fn slot(&self) -> Option<Feed> {
        Some(Feed {
            title: "Stored".into(),
            articles: self.stored.clone(),
            // Deliberately stale
            unread_count: 42,
        })
    }
}

fn make(prefix: &str, i: usize, with_guid: bool) -> Article {
    let article = Article::new(format!("{}{}", prefix, i), format!("https://x/{}{}", prefix, i));
    if with_guid {
        article.with_guid(format!("{}-{}", prefix, i))
    } else {
        article
    }
}

fn case() -> impl Strategy<Value = Case> {
    (
        proptest::collection::vec(proptest::option::of(any::<bool>()), 0..8),
        0usize..8,
        1usize..12,
        any::<bool>(),
    )
        .prop_flat_map(|(flags, new_count, cap, with_guids)| {
            let stored_len = flags.len();
            (Just(flags), Just(new_count), 0..=stored_len, Just(cap), Just(with_guids))
        })
        .prop_map(|(flags, new_count, overlap, cap, with_guids)| Case {
            stored: flags
                .into_iter()
                .enumerate()
                .map(|(i, read)| Article {
                    read,
                    ..make("S", i, with_guids)
                })
                .collect(),
            new: (0..new_count).map(|i| make("N", i, with_guids)).collect(),
            overlap,
            cap,
        })
}

fn titles(articles: &[Article]) -> Vec<String> {
    articles.iter().map(|a| a.title.clone()).collect()
}

proptest! {
    #[test]
    fn prop_unread_counter_is_exact(case in case()) {
        let mut slot = case.slot();
        merge_feed(&mut slot, case.fetched(), case.cap);
        let feed = slot.unwrap();

        let unread = feed.articles.iter().filter(|a| a.read == Some(false)).count();
        prop_assert_eq!(feed.unread_count, unread);
        prop_assert!(feed.articles.iter().all(|a| a.read.is_some()));
    }

    #[test]
    fn prop_cap_holds(case in case()) {
        let mut slot = case.slot();
        merge_feed(&mut slot, case.fetched(), case.cap);
        prop_assert!(slot.unwrap().articles.len() <= case.cap);
    }

    #[test]
    fn prop_new_articles_precede_stored(case in case()) {
        let mut slot = case.slot();
        merge_feed(&mut slot, case.fetched(), case.cap);

        let mut expected = titles(&case.new);
        expected.extend(titles(&case.stored));
        expected.truncate(case.cap);
        prop_assert_eq!(titles(&slot.unwrap().articles), expected);
    }

    #[test]
    fn prop_repoll_adds_nothing(case in case()) {
        let mut slot = case.slot();
        merge_feed(&mut slot, case.fetched(), case.cap);
        let first = slot.clone();

        let outcome = merge_feed(&mut slot, case.fetched(), case.cap);
        prop_assert_eq!(outcome.new_articles(), 0);
        prop_assert_eq!(titles(&slot.unwrap().articles), titles(&first.unwrap().articles));
    }
}
