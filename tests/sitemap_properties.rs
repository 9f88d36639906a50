use finboard::news::sitemap::{Sitemap, SitemapParser};
use finboard::news::ArticleFetcher;
use proptest::prelude::*;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use test_data::sitemap_with;

proptest! {
    #[test]
    fn parsed_locations_keep_document_order(slugs in prop::collection::vec("[a-z0-9-]{1,24}", 0..40)) {
        let urls: Vec<String> = slugs
            .iter()
            .enumerate()
            .map(|(i, slug)| format!("https://news.example.com/{}/{}", i, slug))
            .collect();

        let parsed = SitemapParser::new().parse(&sitemap_with(&urls)).unwrap();
        prop_assert_eq!(parsed, Sitemap::Urls(urls));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn candidate_urls_are_a_prefix_of_the_sitemap(count in 0usize..30, limit in 1usize..40) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (urls, candidates) = runtime.block_on(async {
            let server = MockServer::start().await;
            let urls: Vec<String> = (0..count)
                .map(|i| format!("{}/story/{}", server.uri(), i))
                .collect();

            Mock::given(method("GET"))
                .and(path("/sitemap.xml"))
                .respond_with(ResponseTemplate::new(200).set_body_string(sitemap_with(&urls)))
                .mount(&server)
                .await;

            let fetcher = ArticleFetcher::new().unwrap().with_timeout(Duration::from_secs(5));
            let candidates = fetcher
                .list_candidate_urls(&format!("{}/sitemap.xml", server.uri()), limit)
                .await
                .unwrap();
            (urls, candidates)
        });

        prop_assert_eq!(candidates.len(), count.min(limit));
        prop_assert_eq!(&candidates[..], &urls[..candidates.len()]);
    }
}
