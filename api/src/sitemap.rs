use std::{collections::BTreeMap, fmt::Write, time::Duration};

use axum::{
    Router,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{NaiveDateTime, SecondsFormat};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use retainer::Cache;
use url::Url;

use crate::{
    App,
    error::AppError,
    schema::{chapters, novels},
};

const CACHE_KEY: &str = "sitemap.xml";
const CACHE_TTL: Duration = Duration::from_secs(10 * 60);

pub fn route() -> Router<App> {
    Router::<App>::new().route("/sitemap.xml", get(get_sitemap))
}

#[derive(Debug, PartialEq)]
pub struct SitemapNovel {
    pub slug: String,
    pub updated_at: NaiveDateTime,
    /// Chapter numbers with their last modification, ascending
    pub chapters: Vec<(i32, NaiveDateTime)>,
}

async fn get_sitemap(State(ctx): State<App>) -> Result<Response, AppError> {
    let xml = cached(&ctx.sitemap_cache, CACHE_KEY, CACHE_TTL, || async {
        let base = site_base(&ctx.config.site_url)
            .map_err(|e| eyre::eyre!("invalid SITE_URL {}: {e}", ctx.config.site_url))?;

        let mut conn = ctx.diesel.get().await?;
        let entries = load_entries(&mut conn).await?;

        let xml = render_sitemap(&base, &entries);
        tracing::debug!(novels = entries.len(), bytes = xml.len(), "Sitemap rendered");

        Ok::<_, AppError>(xml)
    })
    .await?;

    Ok(([(header::CONTENT_TYPE, "application/xml")], xml).into_response())
}

/// Returns the cached value under `key`, or renders and caches it for `ttl`.
/// Failed renders are not cached.
async fn cached<F, Fut, E>(
    cache: &Cache<String, String>,
    key: &str,
    ttl: Duration,
    render: F,
) -> Result<String, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<String, E>>,
{
    let key = key.to_string();

    if let Some(hit) = cache.get(&key).await.map(|value| String::clone(&value)) {
        return Ok(hit);
    }

    let value = render().await?;
    cache.insert(key, value.clone(), ttl).await;

    Ok(value)
}

async fn load_entries(
    conn: &mut AsyncPgConnection,
) -> Result<Vec<SitemapNovel>, diesel::result::Error> {
    let published: Vec<(i32, String, NaiveDateTime)> = novels::table
        .filter(novels::published.eq(true))
        .order(novels::id.asc())
        .select((novels::id, novels::slug, novels::updated_at))
        .load(conn)
        .await?;

    let chapter_rows: Vec<(i32, i32, NaiveDateTime)> = chapters::table
        .inner_join(novels::table)
        .filter(novels::published.eq(true))
        .order((chapters::novel_id.asc(), chapters::number.asc()))
        .select((chapters::novel_id, chapters::number, chapters::updated_at))
        .load(conn)
        .await?;

    let mut by_novel = BTreeMap::<i32, Vec<(i32, NaiveDateTime)>>::new();
    for (novel_id, number, updated_at) in chapter_rows {
        by_novel.entry(novel_id).or_default().push((number, updated_at));
    }

    Ok(published
        .into_iter()
        .map(|(id, slug, updated_at)| SitemapNovel {
            slug,
            updated_at,
            chapters: by_novel.remove(&id).unwrap_or_default(),
        })
        .collect())
}

/// The site root as a base that relative paths can be joined onto.
pub fn site_base(site_url: &str) -> Result<Url, url::ParseError> {
    Url::parse(&format!("{}/", site_url.trim_end_matches('/')))
}

fn escape_xml(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn lastmod(at: NaiveDateTime) -> String {
    at.and_utc().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn push_url(xml: &mut String, loc: &Url, modified: Option<NaiveDateTime>) {
    xml.push_str("  <url>\n");
    let _ = writeln!(xml, "    <loc>{}</loc>", escape_xml(loc.as_str()));
    if let Some(modified) = modified {
        let _ = writeln!(xml, "    <lastmod>{}</lastmod>", lastmod(modified));
    }
    xml.push_str("  </url>\n");
}

pub fn render_sitemap(base: &Url, novels: &[SitemapNovel]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );

    push_url(&mut xml, base, None);

    for novel in novels {
        let Ok(novel_url) = base.join(&format!("novels/{}", novel.slug)) else {
            tracing::warn!(slug = %novel.slug, "Skipping novel with unusable slug in sitemap");
            continue;
        };
        push_url(&mut xml, &novel_url, Some(novel.updated_at));

        for (number, updated_at) in &novel.chapters {
            if let Ok(chapter_url) =
                base.join(&format!("novels/{}/chapters/{number}", novel.slug))
            {
                push_url(&mut xml, &chapter_url, Some(*updated_at));
            }
        }
    }

    xml.push_str("</urlset>\n");
    xml
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, d)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_site_base_accepts_trailing_slash() {
        assert_eq!(
            site_base("https://shelf.example").unwrap().as_str(),
            "https://shelf.example/"
        );
        assert_eq!(
            site_base("https://shelf.example/").unwrap().as_str(),
            "https://shelf.example/"
        );
        assert!(site_base("not a url").is_err());
    }

    #[test]
    fn test_empty_catalog_lists_root_only() {
        let base = site_base("https://shelf.example").unwrap();
        let xml = render_sitemap(&base, &[]);

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert_eq!(xml.matches("<url>").count(), 1);
        assert!(xml.contains("<loc>https://shelf.example/</loc>"));
        assert!(!xml.contains("<lastmod>"));
        assert!(xml.trim_end().ends_with("</urlset>"));
    }

    #[test]
    fn test_novels_and_chapters_are_listed() {
        let base = site_base("https://shelf.example").unwrap();
        let novels = vec![
            SitemapNovel {
                slug: "iron-tide".into(),
                updated_at: day(2),
                chapters: vec![(1, day(1)), (2, day(2))],
            },
            SitemapNovel {
                slug: "quiet-harbor".into(),
                updated_at: day(5),
                chapters: vec![],
            },
        ];

        let xml = render_sitemap(&base, &novels);

        assert_eq!(xml.matches("<url>").count(), 5);
        assert!(xml.contains("<loc>https://shelf.example/novels/iron-tide</loc>"));
        assert!(xml.contains("<loc>https://shelf.example/novels/iron-tide/chapters/2</loc>"));
        assert!(xml.contains("<loc>https://shelf.example/novels/quiet-harbor</loc>"));
        assert!(xml.contains("<lastmod>2024-03-05T12:30:00Z</lastmod>"));

        let novel_at = xml.find("novels/iron-tide</loc>").unwrap();
        let chapter_at = xml.find("novels/iron-tide/chapters/1</loc>").unwrap();
        assert!(novel_at < chapter_at);
    }

    #[test]
    fn test_locations_are_escaped() {
        let base = site_base("https://shelf.example/?ref=a&b=c").unwrap();
        let xml = render_sitemap(&base, &[]);

        assert!(xml.contains("&amp;"));
        assert!(!xml.contains("a&b"));
    }

    #[tokio::test]
    async fn test_cached_renders_once() {
        let cache = Cache::new();
        let ttl = Duration::from_secs(60);

        let first = cached(&cache, "k", ttl, || async { Ok::<_, ()>("one".to_string()) }).await;
        assert_eq!(first, Ok("one".to_string()));

        // a second render would fail, so success means a cache hit
        let second = cached(&cache, "k", ttl, || async { Err(()) }).await;
        assert_eq!(second, Ok("one".to_string()));
    }

    #[tokio::test]
    async fn test_cached_skips_failed_render() {
        let cache = Cache::new();
        let ttl = Duration::from_secs(60);

        let failed = cached(&cache, "k", ttl, || async { Err("db down") }).await;
        assert_eq!(failed, Err("db down"));

        let retried = cached(&cache, "k", ttl, || async { Ok::<_, &str>("ok".to_string()) }).await;
        assert_eq!(retried, Ok("ok".to_string()));
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(
            escape_xml(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&apos;s&lt;/a&gt;"
        );
    }
}
