//! PDF assembly engine.
//!
//! One engine builds exactly one document: `Init → AddPage* → Finish`, then
//! it is gone. [`PdfAssembler`] is the synchronous state machine;
//! [`AssemblyEngine`] runs it on a dedicated blocking thread and talks to it
//! only through messages, so the document under construction is never
//! touched from the async side. Page buffers move into the worker with the
//! request that carries them.
//!
//! Out-of-order requests and panics while placing an image come back as
//! [`AssemblyEvent::Error`]. After an error the engine stays failed and must
//! be discarded.

use crate::error::SlidesError;
use crate::pipeline::layout::{PageBox, Placement};
use crate::pipeline::normalize::{flatten_onto_white, NormalizedPage, PageFormat};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::any::Any;
use std::io::Write;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const IMAGE_RESOURCE: &[u8] = b"Im0";
const PRODUCER: &str = "slides2pdf";

/// Message sent to the engine.
#[derive(Debug)]
pub enum AssemblyRequest {
    /// Create the document with a fixed page box; the first page fills it.
    Init {
        page_box: PageBox,
        first_page: NormalizedPage,
    },
    /// Append one page, scaled to fit and centred.
    AddPage { page: NormalizedPage },
    /// Serialize the document and end the engine.
    Finish,
}

impl AssemblyRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            AssemblyRequest::Init { .. } => "INIT",
            AssemblyRequest::AddPage { .. } => "ADD_PAGE",
            AssemblyRequest::Finish => "FINISH",
        }
    }
}

/// Reply from the engine, one per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyEvent {
    InitSuccess,
    PageAdded { page_num: usize },
    Done { pdf: Vec<u8>, page_count: usize },
    Error { message: String },
}

impl AssemblyEvent {
    fn kind(&self) -> &'static str {
        match self {
            AssemblyEvent::InitSuccess => "INIT_SUCCESS",
            AssemblyEvent::PageAdded { .. } => "PAGE_ADDED",
            AssemblyEvent::Done { .. } => "DONE",
            AssemblyEvent::Error { .. } => "ERROR",
        }
    }
}

enum EngineState {
    Uninitialized,
    Ready(Box<AssemblyState>),
    Finalized,
    Failed,
}

impl EngineState {
    fn name(&self) -> &'static str {
        match self {
            EngineState::Uninitialized => "uninitialized",
            EngineState::Ready(_) => "ready",
            EngineState::Finalized => "finalized",
            EngineState::Failed => "failed",
        }
    }
}

/// Synchronous assembly state machine.
pub struct PdfAssembler {
    title: String,
    state: EngineState,
}

impl PdfAssembler {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            state: EngineState::Uninitialized,
        }
    }

    /// `false` once the engine has failed or finished.
    pub fn is_usable(&self) -> bool {
        matches!(
            self.state,
            EngineState::Uninitialized | EngineState::Ready(_)
        )
    }

    /// Apply one request and return its event.
    pub fn handle(&mut self, request: AssemblyRequest) -> AssemblyEvent {
        let kind = request.kind();
        // The state reads as Failed for as long as a request is in progress,
        // so a panic half-way leaves the engine unusable.
        let state = mem::replace(&mut self.state, EngineState::Failed);

        let (next, event) = match (state, request) {
            (
                EngineState::Uninitialized,
                AssemblyRequest::Init {
                    page_box,
                    first_page,
                },
            ) => match AssemblyState::new(page_box, first_page) {
                Ok(doc) => (EngineState::Ready(Box::new(doc)), AssemblyEvent::InitSuccess),
                Err(message) => (EngineState::Failed, AssemblyEvent::Error { message }),
            },
            (EngineState::Ready(mut doc), AssemblyRequest::AddPage { page }) => {
                let page_num = page.page_num;
                match doc.add_page(page) {
                    Ok(()) => (
                        EngineState::Ready(doc),
                        AssemblyEvent::PageAdded { page_num },
                    ),
                    Err(message) => (EngineState::Failed, AssemblyEvent::Error { message }),
                }
            }
            (EngineState::Ready(doc), AssemblyRequest::Finish) => match doc.finish(&self.title) {
                Ok((pdf, page_count)) => (
                    EngineState::Finalized,
                    AssemblyEvent::Done { pdf, page_count },
                ),
                Err(message) => (EngineState::Failed, AssemblyEvent::Error { message }),
            },
            (state, _) => (
                EngineState::Failed,
                AssemblyEvent::Error {
                    message: format!("{} received while {}", kind, state.name()),
                },
            ),
        };

        self.state = next;
        event
    }
}

/// The document under construction.
struct AssemblyState {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
    page_box: PageBox,
}

impl AssemblyState {
    fn new(page_box: PageBox, first_page: NormalizedPage) -> Result<Self, String> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        debug!(
            "New document {:.1}x{:.1} mm, {:?}",
            page_box.width_mm,
            page_box.height_mm,
            page_box.orientation()
        );

        let mut state = Self {
            doc,
            pages_id,
            kids: Vec::new(),
            page_box,
        };
        state.push_page(first_page, Placement::fill(page_box))?;
        Ok(state)
    }

    fn add_page(&mut self, page: NormalizedPage) -> Result<(), String> {
        let placement = self.page_box.place(page.width_px, page.height_px);
        self.push_page(page, placement)
    }

    fn push_page(&mut self, page: NormalizedPage, placement: Placement) -> Result<(), String> {
        let page_num = page.page_num;
        let format = page.format;
        let image = image_xobject(page)?;
        let image_id = self.doc.add_object(image);

        let matrix = placement
            .to_pdf_matrix(self.page_box)
            .iter()
            .map(|v| Object::Real(*v as f32))
            .collect();
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new("cm", matrix),
                Operation::new("Do", vec![Object::Name(IMAGE_RESOURCE.to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_bytes = content
            .encode()
            .map_err(|e| format!("page {}: content stream: {}", page_num, e))?;
        let content_id = self
            .doc
            .add_object(Stream::new(Dictionary::new(), content_bytes));

        let (width_pt, height_pt) = self.page_box.size_pt();
        let resources = Dictionary::from_iter([(
            "XObject",
            Object::Dictionary(Dictionary::from_iter([(
                IMAGE_RESOURCE.to_vec(),
                Object::Reference(image_id),
            )])),
        )]);
        let page_id = self.doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(self.pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(width_pt as f32),
                    Object::Real(height_pt as f32),
                ]),
            ),
            ("Contents", Object::Reference(content_id)),
            ("Resources", Object::Dictionary(resources)),
        ]));

        self.kids.push(Object::Reference(page_id));
        debug!(
            "Placed page {} ({}) as PDF page {}",
            page_num,
            format.as_str(),
            self.kids.len()
        );
        Ok(())
    }

    fn finish(self, title: &str) -> Result<(Vec<u8>, usize), String> {
        let Self {
            mut doc,
            pages_id,
            kids,
            ..
        } = self;
        let page_count = kids.len();

        let pages = Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(page_count as i64)),
        ]);
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        let info_id = doc.add_object(Dictionary::from_iter([
            ("Title", Object::string_literal(title)),
            ("Producer", Object::string_literal(PRODUCER)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc.trailer.set("Info", Object::Reference(info_id));

        let mut output = Vec::new();
        doc.save_to(&mut output)
            .map_err(|e| format!("failed to serialize PDF: {}", e))?;
        Ok((output, page_count))
    }
}

/// Build the image XObject for one page payload.
fn image_xobject(page: NormalizedPage) -> Result<Stream, String> {
    let (width, height, filter, data) = match page.format {
        PageFormat::Jpeg => (page.width_px, page.height_px, "DCTDecode", page.buffer),
        PageFormat::Png => {
            let img = image::load_from_memory_with_format(&page.buffer, image::ImageFormat::Png)
                .map_err(|e| format!("page {}: PNG decode failed: {}", page.page_num, e))?;
            let rgb = flatten_onto_white(&img);
            let (width, height) = rgb.dimensions();

            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder
                .write_all(rgb.as_raw())
                .and_then(|_| encoder.finish())
                .map(|data| (width, height, "FlateDecode", data))
                .map_err(|e| format!("page {}: compression failed: {}", page.page_num, e))?
        }
    };

    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(i64::from(width)));
    dict.set("Height", Object::Integer(i64::from(height)));
    dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict.set("Filter", Object::Name(filter.as_bytes().to_vec()));
    Ok(Stream::new(dict, data))
}

type Envelope = (AssemblyRequest, oneshot::Sender<AssemblyEvent>);

/// Handle to a [`PdfAssembler`] running on its own blocking thread.
pub struct AssemblyEngine {
    tx: mpsc::Sender<Envelope>,
    worker: JoinHandle<()>,
}

impl AssemblyEngine {
    /// Start a fresh worker. Must be called from within a tokio runtime.
    pub fn spawn(title: impl Into<String>) -> Self {
        let (tx, mut rx) = mpsc::channel::<Envelope>(1);
        let title = title.into();

        let worker = tokio::task::spawn_blocking(move || {
            let mut assembler = PdfAssembler::new(title);
            while let Some((request, reply)) = rx.blocking_recv() {
                let kind = request.kind();
                let event = panic::catch_unwind(AssertUnwindSafe(|| assembler.handle(request)))
                    .unwrap_or_else(|payload| AssemblyEvent::Error {
                        message: format!("{} panicked: {}", kind, panic_message(&*payload)),
                    });
                let _ = reply.send(event);
                if !assembler.is_usable() {
                    break;
                }
            }
            debug!("Assembly worker stopped");
        });

        Self { tx, worker }
    }

    async fn request(&self, request: AssemblyRequest) -> Result<AssemblyEvent, SlidesError> {
        let kind = request.kind();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send((request, reply_tx))
            .await
            .map_err(|_| SlidesError::AssemblyFailed {
                detail: format!("worker is gone, cannot send {}", kind),
            })?;
        let event = reply_rx.await.map_err(|_| SlidesError::AssemblyFailed {
            detail: format!("worker stopped before answering {}", kind),
        })?;

        match event {
            AssemblyEvent::Error { message } => Err(SlidesError::AssemblyFailed { detail: message }),
            event => Ok(event),
        }
    }

    pub async fn init(&self, page_box: PageBox, first_page: NormalizedPage) -> Result<(), SlidesError> {
        match self
            .request(AssemblyRequest::Init {
                page_box,
                first_page,
            })
            .await?
        {
            AssemblyEvent::InitSuccess => Ok(()),
            other => Err(unexpected("INIT", &other)),
        }
    }

    /// Append a page; returns the page number the worker applied.
    pub async fn add_page(&self, page: NormalizedPage) -> Result<usize, SlidesError> {
        match self.request(AssemblyRequest::AddPage { page }).await? {
            AssemblyEvent::PageAdded { page_num } => Ok(page_num),
            other => Err(unexpected("ADD_PAGE", &other)),
        }
    }

    /// Finalize the document and tear the worker down.
    ///
    /// Returns the serialized PDF and its page count.
    pub async fn finish(self) -> Result<(Vec<u8>, usize), SlidesError> {
        let result = self.request(AssemblyRequest::Finish).await;
        self.shutdown().await;
        match result? {
            AssemblyEvent::Done { pdf, page_count } => Ok((pdf, page_count)),
            other => Err(unexpected("FINISH", &other)),
        }
    }

    /// Tear the worker down without finishing; the partial document is
    /// discarded.
    pub async fn shutdown(self) {
        let Self { tx, worker } = self;
        drop(tx);
        if let Err(e) = worker.await {
            warn!("Assembly worker ended abnormally: {}", e);
        }
    }
}

fn unexpected(request: &str, event: &AssemblyEvent) -> SlidesError {
    SlidesError::AssemblyFailed {
        detail: format!("unexpected {} reply to {}", event.kind(), request),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
