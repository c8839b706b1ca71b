pub mod extractor;
pub mod images;


use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use ureq::Agent;
use url::Url;

use self::extractor::{ProductPage, extract_item_links, extract_product};
use self::images::{ImageStore, image_file_name, resolve_image_url};
use crate::config::{Config, HarvestConfig};
use crate::database::sqlite::{Database, InsertOutcome, NewItem};

/// Listing page statuses that still carry a product grid
const LISTING_OK_STATUSES: [u16; 3] = [200, 301, 302];

const PAGE_BODY_LIMIT: u64 = 10 * 1024 * 1024;
const IMAGE_BODY_LIMIT: u64 = 50 * 1024 * 1024;

/// A fetched page whose status was not treated as an error
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

/// Blocking HTTP client with separate timeouts for pages and images
#[derive(Debug, Clone)]
pub struct HttpClient {
    page_agent: Agent,
    image_agent: Agent,
}

impl HttpClient {
    #[inline]
    pub fn new(config: &HarvestConfig) -> Self {
        Self {
            page_agent: build_agent(&config.user_agent, config.page_timeout_seconds),
            image_agent: build_agent(&config.user_agent, config.image_timeout_seconds),
        }
    }

    /// GET a page; any HTTP status is returned, only transport failures error
    #[inline]
    pub fn get_page(&self, url: &str) -> Result<FetchedPage> {
        debug!("Making HTTP GET request to: {}", url);

        let mut response = self
            .page_agent
            .get(url)
            .call()
            .with_context(|| format!("Failed to make HTTP request to {}", url))?;

        let status = response.status().as_u16();
        let bytes = response
            .body_mut()
            .with_config()
            .limit(PAGE_BODY_LIMIT)
            .read_to_vec()
            .with_context(|| format!("Failed to read response body from {}", url))?;

        // Pages with stray non-UTF-8 bytes are still parsed
        let body = String::from_utf8_lossy(&bytes).into_owned();

        debug!("Read {} bytes from {} (status {})", bytes.len(), url, status);
        Ok(FetchedPage { status, body })
    }

    /// GET raw image bytes; non-2xx is an error
    #[inline]
    pub fn get_image(&self, url: &str) -> Result<Vec<u8>> {
        let mut response = self
            .image_agent
            .get(url)
            .call()
            .with_context(|| format!("Failed to download image {}", url))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(anyhow!("HTTP error {} for image {}", status, url));
        }

        response
            .body_mut()
            .with_config()
            .limit(IMAGE_BODY_LIMIT)
            .read_to_vec()
            .with_context(|| format!("Failed to read image body from {}", url))
    }
}

fn build_agent(user_agent: &str, timeout_seconds: u64) -> Agent {
    Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(timeout_seconds)))
        .user_agent(user_agent)
        .http_status_as_error(false)
        .build()
        .into()
}

/// Validate a base listing URL and make sure `page/{n}/` joins below it
#[inline]
pub fn normalize_base_url(base_url: &str) -> Result<Url> {
    let mut url =
        Url::parse(base_url).with_context(|| format!("Invalid URL format: {}", base_url))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(anyhow!("URL must use HTTP or HTTPS scheme: {}", base_url));
    }
    if url.host_str().is_none() {
        return Err(anyhow!("URL must have a valid host: {}", base_url));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// `base/page/{n}/` for 1-based `page`
#[inline]
pub fn listing_url(base_url: &Url, page: u32) -> Result<Url> {
    base_url
        .join(&format!("page/{}/", page))
        .with_context(|| format!("Failed to build listing URL for page {}", page))
}

/// Why the page loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every page up to the limit was visited
    PageLimit,
    /// A listing page answered with a status outside 200/301/302
    HttpStatus(u16),
    /// A listing page could not be fetched at all
    FetchFailed,
    /// A listing page had no item links
    NoItemLinks,
}

impl std::fmt::Display for StopReason {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            StopReason::PageLimit => write!(f, "page limit reached"),
            StopReason::HttpStatus(code) => write!(f, "listing returned HTTP {}", code),
            StopReason::FetchFailed => write!(f, "listing fetch failed"),
            StopReason::NoItemLinks => write!(f, "listing had no item links"),
        }
    }
}

/// What happened to one item link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Inserted { images_saved: usize, images_failed: usize },
    AlreadyPresent,
    Failed(String),
}

/// Summary of a harvest run
#[derive(Debug, Clone, Copy)]
pub struct HarvestStats {
    pub pages_visited: u32,
    pub links_found: usize,
    pub inserted: usize,
    pub already_present: usize,
    pub failed: usize,
    pub images_saved: usize,
    pub images_failed: usize,
    pub stop_reason: StopReason,
    pub duration: Duration,
}

impl HarvestStats {
    fn new() -> Self {
        Self {
            pages_visited: 0,
            links_found: 0,
            inserted: 0,
            already_present: 0,
            failed: 0,
            images_saved: 0,
            images_failed: 0,
            stop_reason: StopReason::PageLimit,
            duration: Duration::default(),
        }
    }

    fn record(&mut self, outcome: &ItemOutcome) {
        match *outcome {
            ItemOutcome::Inserted {
                images_saved,
                images_failed,
            } => {
                self.inserted += 1;
                self.images_saved += images_saved;
                self.images_failed += images_failed;
            }
            ItemOutcome::AlreadyPresent => self.already_present += 1,
            ItemOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Paginated catalog crawler writing one record per new item
pub struct Harvester {
    client: HttpClient,
    database: Database,
    images: ImageStore,
    config: HarvestConfig,
}

impl Harvester {
    #[inline]
    pub fn new(database: Database, config: &Config) -> Self {
        Self {
            client: HttpClient::new(&config.harvest),
            database,
            images: ImageStore::new(&config.root, &config.harvest.image_dir),
            config: config.harvest.clone(),
        }
    }

    /// Walk `base_url/page/{n}/` for n in 1..=max_pages, stopping early on a
    /// bad listing status, a fetch failure or an empty listing
    #[inline]
    pub async fn harvest(&self, base_url: &str, max_pages: u32) -> Result<HarvestStats> {
        let start_time = Instant::now();
        let base_url = normalize_base_url(base_url)?;
        info!("Starting harvest of {} ({} pages max)", base_url, max_pages);

        let bar = if console::user_attended_stderr() {
            ProgressBar::new(u64::from(max_pages)).with_style(
                ProgressStyle::with_template("{spinner} [{pos}/{len}] Harvesting {msg}")
                    .expect("style template is valid"),
            )
        } else {
            ProgressBar::hidden()
        };

        let mut stats = HarvestStats::new();

        for page in 1..=max_pages {
            let page_url = listing_url(&base_url, page)?;
            bar.set_message(page_url.to_string());
            info!("Listing page {} -> {}", page, page_url);

            let listing = match self.client.get_page(page_url.as_str()) {
                Ok(listing) => listing,
                Err(e) => {
                    error!("Listing request failed for {}: {:#}", page_url, e);
                    stats.stop_reason = StopReason::FetchFailed;
                    break;
                }
            };
            stats.pages_visited += 1;

            if !LISTING_OK_STATUSES.contains(&listing.status) {
                warn!("Listing {} returned HTTP {}", page_url, listing.status);
                stats.stop_reason = StopReason::HttpStatus(listing.status);
                break;
            }

            let links = extract_item_links(&listing.body, &page_url);
            info!("Found {} item links on page {}", links.len(), page);
            if links.is_empty() {
                stats.stop_reason = StopReason::NoItemLinks;
                break;
            }
            stats.links_found += links.len();

            for item_url in &links {
                let outcome = self.harvest_item(item_url).await?;
                if let ItemOutcome::Failed(ref reason) = outcome {
                    error!("Item failed {}: {}", item_url, reason);
                    sleep(Duration::from_millis(self.config.failure_backoff_ms)).await;
                }
                stats.record(&outcome);
            }

            bar.inc(1);
        }

        bar.finish_and_clear();
        stats.duration = start_time.elapsed();

        info!(
            "Harvest finished ({}): {} pages, {} inserted, {} already present, {} failed, {} images saved, took {:?}",
            stats.stop_reason,
            stats.pages_visited,
            stats.inserted,
            stats.already_present,
            stats.failed,
            stats.images_saved,
            stats.duration
        );

        Ok(stats)
    }

    /// Store errors propagate; network and markup problems become outcomes
    async fn harvest_item(&self, item_url: &str) -> Result<ItemOutcome> {
        if self.database.item_exists(item_url).await? {
            debug!("Already in store: {}", item_url);
            return Ok(ItemOutcome::AlreadyPresent);
        }

        info!("Extracting {}", item_url);
        let page_url = match Url::parse(item_url) {
            Ok(url) => url,
            Err(e) => return Ok(ItemOutcome::Failed(format!("invalid item URL: {}", e))),
        };

        let page = match self.client.get_page(item_url) {
            Ok(page) => page,
            Err(e) => return Ok(ItemOutcome::Failed(format!("{:#}", e))),
        };
        if !(200..300).contains(&page.status) {
            return Ok(ItemOutcome::Failed(format!("HTTP error {}", page.status)));
        }

        let product = extract_product(&page.body);
        let (images, images_failed) = self.save_images(&product, &page_url).await;
        let images_saved = images.len();

        let new_item = NewItem {
            url: item_url.to_string(),
            name: product.name,
            price_before: product.price_before,
            price_after: product.price_after,
            discount: product.discount,
            category: product.category,
            sub_category: product.sub_category,
            description: product.description,
            images,
            harvested_on: Utc::now().date_naive(),
        };

        match self.database.insert_item(&new_item).await? {
            InsertOutcome::Inserted { id } => {
                info!("Saved item {} ({})", new_item.name, id);
                Ok(ItemOutcome::Inserted {
                    images_saved,
                    images_failed,
                })
            }
            InsertOutcome::AlreadyPresent => Ok(ItemOutcome::AlreadyPresent),
        }
    }

    /// Download every gallery image; failures only drop that image
    async fn save_images(&self, product: &ProductPage, page_url: &Url) -> (Vec<String>, usize) {
        let mut saved = Vec::new();
        let mut failed = 0;

        for src in &product.image_sources {
            match self.save_image(src, page_url).await {
                Ok(Some(path)) => saved.push(path),
                Ok(None) => {
                    debug!("No usable file name for image {}", src);
                    failed += 1;
                }
                Err(e) => {
                    warn!("Image skipped {}: {:#}", src, e);
                    failed += 1;
                }
            }
        }

        (saved, failed)
    }

    async fn save_image(&self, src: &str, page_url: &Url) -> Result<Option<String>> {
        let Some(file_name) = image_file_name(src) else {
            return Ok(None);
        };
        let Some(image_url) = resolve_image_url(src, page_url) else {
            return Ok(None);
        };

        let bytes = self.client.get_image(image_url.as_str())?;
        let path = self.images.save(&file_name, &bytes).await?;
        Ok(Some(path))
    }
}
