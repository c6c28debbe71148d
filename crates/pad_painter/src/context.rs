//! Shared state handed down the pad tree.

use crate::colors::ColorTable;
use crate::fonts::FontRegistry;
use crate::pad::PadPainter;
use crate::painter::DrawDispatcher;
use crate::style::StyleStore;
use glam::Vec2;
use pad_model::SnapObject;
use smol::LocalExecutor;
use std::cell::{Ref, RefCell, RefMut};
use std::future::Future;
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Tunables of the pad tree.
#[derive(Clone, Debug, PartialEq)]
pub struct PadConfig {
    /// Multiplier applied to the measured canvas size.
    pub scale: f32,
    pub toolbar: bool,
    pub context_menu: bool,
    /// Delay before the server is told about a resize.
    pub resize_delay: Duration,
    /// Surfaces at or below this size in either dimension are hidden.
    pub min_size: f32,
    /// Size used when no usable size is known.
    pub fallback_size: Vec2,
    /// Height to width ratio used when the pad declares none.
    pub aspect_factor: f64,
    /// Headless rendering, no interactivity and no resize notifications.
    pub batch: bool,
    /// Canvas size used in batch mode when the snapshot declares none.
    pub batch_size: (u32, u32),
}

impl Default for PadConfig {
    fn default() -> Self {
        Self {
            scale: 1.0,
            toolbar: true,
            context_menu: true,
            resize_delay: Duration::from_millis(1000),
            min_size: 5.0,
            fallback_size: Vec2::new(800.0, 600.0),
            aspect_factor: 0.66,
            batch: false,
            batch_size: (900, 700),
        }
    }
}

/// Context shared by every pad of one canvas tree: style, colors, fonts,
/// the object dispatcher and the executor running pad tasks.
pub struct PaintContext {
    config: PadConfig,
    style: RefCell<StyleStore>,
    colors: RefCell<ColorTable>,
    fonts: RefCell<FontRegistry>,
    dispatcher: Rc<dyn DrawDispatcher>,
    executor: Rc<LocalExecutor<'static>>,
    active_pad: RefCell<Weak<PadPainter>>,
}

impl PaintContext {
    pub fn new(config: PadConfig, dispatcher: Rc<dyn DrawDispatcher>) -> Rc<Self> {
        Self::with_executor(config, dispatcher, Rc::new(LocalExecutor::new()))
    }

    pub fn with_executor(
        config: PadConfig,
        dispatcher: Rc<dyn DrawDispatcher>,
        executor: Rc<LocalExecutor<'static>>,
    ) -> Rc<Self> {
        Rc::new(Self {
            config,
            style: RefCell::new(StyleStore::default()),
            colors: RefCell::new(ColorTable::default()),
            fonts: RefCell::new(FontRegistry::default()),
            dispatcher,
            executor,
            active_pad: RefCell::new(Weak::new()),
        })
    }

    pub fn config(&self) -> &PadConfig {
        &self.config
    }

    pub fn executor(&self) -> &Rc<LocalExecutor<'static>> {
        &self.executor
    }

    /// Run `future` detached on the pad executor.
    pub fn spawn(&self, future: impl Future<Output = ()> + 'static) {
        self.executor.spawn(future).detach();
    }

    pub fn dispatcher(&self) -> Rc<dyn DrawDispatcher> {
        self.dispatcher.clone()
    }

    pub fn style(&self) -> Ref<'_, StyleStore> {
        self.style.borrow()
    }

    pub fn style_mut(&self) -> RefMut<'_, StyleStore> {
        self.style.borrow_mut()
    }

    pub fn merge_style(&self, style: &SnapObject) {
        self.style.borrow_mut().merge(style);
    }

    pub fn colors(&self) -> Ref<'_, ColorTable> {
        self.colors.borrow()
    }

    pub fn colors_mut(&self) -> RefMut<'_, ColorTable> {
        self.colors.borrow_mut()
    }

    pub fn fonts(&self) -> Ref<'_, FontRegistry> {
        self.fonts.borrow()
    }

    pub fn fonts_mut(&self) -> RefMut<'_, FontRegistry> {
        self.fonts.borrow_mut()
    }

    pub fn active_pad(&self) -> Option<Rc<PadPainter>> {
        self.active_pad.borrow().upgrade()
    }

    pub fn set_active_pad(&self, pad: &Rc<PadPainter>) {
        *self.active_pad.borrow_mut() = Rc::downgrade(pad);
    }

    pub fn is_active_pad(&self, pad: &PadPainter) -> bool {
        self.active_pad
            .borrow()
            .upgrade()
            .is_some_and(|active| std::ptr::eq(Rc::as_ptr(&active), pad))
    }
}
