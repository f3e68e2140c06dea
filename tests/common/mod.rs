//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use slides2pdf::{CancellationToken, DownloadProgressCallback, Segment, SlideFetcher, SlidesError};
use std::collections::HashSet;
use std::future::Future;
use std::io::Cursor;
use std::sync::Mutex;

pub const BASE_URL: &str = "https://slides.test/deck/";

pub fn png(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Png)
}

pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Jpeg)
}

fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([40, 90, 160])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format)
        .expect("image encode");
    buf
}

/// Page number from a `…/<n>.png` URL.
pub fn page_of(url: &str) -> usize {
    url.rsplit('/')
        .next()
        .and_then(|file| file.strip_suffix(".png"))
        .and_then(|n| n.parse().ok())
        .expect("slide url")
}

/// In-memory slide server.
///
/// Slide `n` is a `(base_width + n) x height` PNG when `vary_width` is set,
/// so the page order inside a PDF can be read back from image widths.
pub struct MemoryFetcher {
    pub base_width: u32,
    pub height: u32,
    pub vary_width: bool,
    /// Serve JPEG bytes under the `.png` URLs.
    pub serve_jpeg: bool,
    pub failing: HashSet<usize>,
    /// Abort this token when the given page is requested.
    pub abort_on: Option<(usize, CancellationToken)>,
    requests: Mutex<Vec<usize>>,
}

impl MemoryFetcher {
    pub fn new(base_width: u32, height: u32) -> Self {
        Self {
            base_width,
            height,
            vary_width: false,
            serve_jpeg: false,
            failing: HashSet::new(),
            abort_on: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn varying(mut self) -> Self {
        self.vary_width = true;
        self
    }

    pub fn serving_jpeg(mut self) -> Self {
        self.serve_jpeg = true;
        self
    }

    pub fn failing(mut self, pages: &[usize]) -> Self {
        self.failing.extend(pages.iter().copied());
        self
    }

    pub fn abort_on(mut self, page: usize, token: &CancellationToken) -> Self {
        self.abort_on = Some((page, token.clone()));
        self
    }

    pub fn width_of(&self, page: usize) -> u32 {
        if self.vary_width {
            self.base_width + page as u32
        } else {
            self.base_width
        }
    }

    /// Requested pages, in request order.
    pub fn requests(&self) -> Vec<usize> {
        self.requests.lock().unwrap().clone()
    }

    fn respond(&self, url: &str) -> Result<Vec<u8>, SlidesError> {
        let page = page_of(url);
        self.requests.lock().unwrap().push(page);
        if let Some((abort_page, ref token)) = self.abort_on {
            if page == abort_page {
                token.abort("stop pressed");
            }
        }
        if self.failing.contains(&page) {
            return Err(SlidesError::DownloadFailed {
                url: url.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            });
        }
        if self.serve_jpeg {
            Ok(jpeg(self.width_of(page), self.height))
        } else {
            Ok(png(self.width_of(page), self.height))
        }
    }
}

impl SlideFetcher for MemoryFetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, SlidesError>> + Send {
        let result = self.respond(url);
        async move {
            tokio::task::yield_now().await;
            result
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    RunStart { total: usize, parts: usize },
    SegmentStart { part: usize, segment: Segment },
    PageComplete(usize),
    PageSkipped(usize),
    SegmentComplete { part: usize, pages: usize },
    RunComplete { total: usize, added: usize },
}

/// Records every callback; optionally declines splitting or aborts after a
/// given part.
#[derive(Default)]
pub struct Recorder {
    pub events: Mutex<Vec<Event>>,
    pub decline_split: bool,
    pub abort_after_part: Option<(usize, CancellationToken)>,
}

impl Recorder {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn completed_pages(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::PageComplete(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl DownloadProgressCallback for Recorder {
    fn on_run_start(&self, total_pages: usize, parts: usize) {
        self.push(Event::RunStart {
            total: total_pages,
            parts,
        });
    }

    fn confirm_split(&self, _total_pages: usize, _parts: usize) -> bool {
        !self.decline_split
    }

    fn on_segment_start(&self, part: usize, _parts: usize, segment: Segment) {
        self.push(Event::SegmentStart { part, segment });
    }

    fn on_page_complete(&self, page_num: usize, _total_pages: usize) {
        self.push(Event::PageComplete(page_num));
    }

    fn on_page_skipped(&self, page_num: usize, _total_pages: usize, _error: &str) {
        self.push(Event::PageSkipped(page_num));
    }

    fn on_segment_complete(&self, part: usize, _parts: usize, page_count: usize, _bytes: usize) {
        self.push(Event::SegmentComplete {
            part,
            pages: page_count,
        });
        if let Some((after, ref token)) = self.abort_after_part {
            if part == after {
                token.abort("stop pressed");
            }
        }
    }

    fn on_run_complete(&self, total_pages: usize, added_pages: usize) {
        self.push(Event::RunComplete {
            total: total_pages,
            added: added_pages,
        });
    }
}

/// Image width of every page in `pdf`, in page order.
pub fn image_widths(pdf: &[u8]) -> Vec<i64> {
    let doc = lopdf::Document::load_mem(pdf).expect("valid pdf");
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let page = doc.get_dictionary(page_id).unwrap();
            let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
            let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
            let (_, image_ref) = xobjects.iter().next().expect("one image per page");
            let image = doc
                .get_object(image_ref.as_reference().unwrap())
                .unwrap()
                .as_stream()
                .unwrap();
            image.dict.get(b"Width").unwrap().as_i64().unwrap()
        })
        .collect()
}

pub fn page_count(pdf: &[u8]) -> usize {
    lopdf::Document::load_mem(pdf)
        .expect("valid pdf")
        .get_pages()
        .len()
}
