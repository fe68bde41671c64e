//! Main viewer application.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use egui::{CentralPanel, Color32, Key, RichText, SidePanel, TopBottomPanel};

use crate::catalog::{load_catalog, Item, LoadedCatalog};
use crate::selection::{SelectionChange, SelectionController, SelectionSink};
use crate::session::{
    AssetSource, ControlsConfig, FfmpegDecoder, FrameRequest, FsSource, KitCell, RenderKit, SessionEnv, SessionManager,
    StlLoader, SurfaceSize, NO_COLLECTIONS,
};
use crate::settings::Settings;
use crate::token::Generation;

use super::gpu::{GpuEngine, SurfaceRegistry};
use super::pane::{PreviewPane, ACCENT, DIM, HUD};

struct Status {
    text: String,
    lit: bool,
}

impl Status {
    fn set(&mut self, text: impl Into<String>, lit: bool) {
        self.text = text.into();
        self.lit = lit;
    }
}

enum DetailsView {
    Item(Arc<Item>),
    Placeholder { title: &'static str, hint: &'static str },
}

const NO_ITEMS: DetailsView =
    DetailsView::Placeholder { title: "No Items Found", hint: "Clear filter or add catalog entries." };
const NO_DATA: DetailsView =
    DetailsView::Placeholder { title: "No Data Loaded", hint: "Add monospec-data.json to the catalog root." };

/// Routes selection side effects into the panels and the session manager.
struct UiSink<'a> {
    sessions: &'a mut SessionManager,
    details: &'a mut DetailsView,
    highlight: &'a mut Option<usize>,
    status: &'a mut Status,
}

impl SelectionSink for UiSink<'_> {
    fn highlight(&mut self, index: Option<usize>) {
        *self.highlight = index;
    }

    fn swap_asset(&mut self, change: &SelectionChange) {
        self.sessions.apply(change);
        match change.item() {
            Some(item) => self.status.set(format!("SELECT {}", item.id), false),
            None => self.status.set("EMPTY", false),
        }
    }

    fn details(&mut self, item: Option<&Arc<Item>>) {
        *self.details = match item {
            Some(item) => DetailsView::Item(Arc::clone(item)),
            None => NO_ITEMS,
        };
    }
}

pub struct MonospecApp {
    settings: Settings,
    root: PathBuf,
    loaded: LoadedCatalog,
    selection: SelectionController,
    sessions: SessionManager,
    pane: PreviewPane,
    render_state: Option<egui_wgpu::RenderState>,
    filter: String,
    status: Status,
    details: DetailsView,
    highlight: Option<usize>,
    scroll_to_selection: bool,
    started: Instant,
    is_fullscreen: bool,
    _trace_guard: Option<tracing_chrome::FlushGuard>,
}

impl MonospecApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        settings: Settings,
        root: PathBuf,
        trace_guard: Option<tracing_chrome::FlushGuard>,
    ) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());

        let registry = Arc::new(SurfaceRegistry::new());
        let render_state = cc.wgpu_render_state.clone();
        let kit = match &render_state {
            Some(rs) => {
                let (device, queue, format) = (rs.device.clone(), rs.queue.clone(), rs.target_format);
                let registry = Arc::clone(&registry);
                KitCell::new(move || {
                    Ok(RenderKit {
                        engine: Arc::new(GpuEngine::new(device.clone(), queue.clone(), format, Arc::clone(&registry))),
                        loader: Arc::new(StlLoader),
                    })
                })
            }
            None => KitCell::unavailable("no wgpu render state"),
        };

        let env = SessionEnv::new(
            Arc::new(FsSource::new(root.clone())),
            Arc::new(kit),
            Arc::new(FfmpegDecoder::new(settings.ffmpeg_path.clone(), settings.ffprobe_path.clone())),
        )
        .with_controls(ControlsConfig {
            rotate_speed: settings.rotate_speed,
            pan_speed: settings.pan_speed,
            zoom_speed: settings.zoom_speed,
        });

        let generation = Generation::new();
        let loaded = load_catalog(&root, &settings.data_sources);
        let selection = SelectionController::new(Arc::clone(&loaded.catalog), generation.clone());
        let (text, lit) = loaded.status();

        let mut app = Self {
            sessions: SessionManager::new(env, generation, SurfaceSize::default()),
            pane: PreviewPane::new(registry),
            render_state,
            settings,
            root,
            loaded,
            selection,
            filter: String::new(),
            status: Status { text, lit },
            details: NO_DATA,
            highlight: None,
            scroll_to_selection: false,
            started: Instant::now(),
            is_fullscreen: false,
            _trace_guard: trace_guard,
        };
        app.start_catalog();
        app
    }

    /// Point the selection at the first collection, or show the empty-catalog state.
    fn start_catalog(&mut self) {
        let first = self.loaded.catalog.collections().first().map(|c| c.id.clone());
        match first {
            None => {
                self.sessions.show_notice(NO_COLLECTIONS);
                self.details = NO_DATA;
                self.highlight = None;
            }
            Some(id) => {
                let filter = self.filter.clone();
                self.with_sink(|selection, sink| selection.set_filter(&filter, Some(&id), sink));
            }
        }
    }

    fn with_sink<R>(&mut self, f: impl FnOnce(&mut SelectionController, &mut UiSink<'_>) -> R) -> R {
        let mut sink = UiSink {
            sessions: &mut self.sessions,
            details: &mut self.details,
            highlight: &mut self.highlight,
            status: &mut self.status,
        };
        let out = f(&mut self.selection, &mut sink);
        self.scroll_to_selection = true;
        out
    }

    fn open_root(&mut self, root: PathBuf) {
        tracing::info!(root = %root.display(), "opening catalog root");
        let source: Arc<dyn AssetSource> = Arc::new(FsSource::new(root.clone()));
        let env = SessionEnv { source, ..self.sessions.env().clone() };
        let generation = self.sessions.generation().clone();

        self.sessions.teardown();
        self.sessions = SessionManager::new(env, generation.clone(), self.sessions.mount().size());
        self.loaded = load_catalog(&root, &self.settings.data_sources);
        self.selection = SelectionController::new(Arc::clone(&self.loaded.catalog), generation);
        self.root = root;
        self.start_catalog();
        let (text, lit) = self.loaded.status();
        self.status.set(text, lit);
    }

    fn open_root_dialog(&mut self) {
        if let Some(path) = rfd::FileDialog::new().set_directory(&self.root).pick_folder() {
            self.open_root(path);
        }
    }

    fn menu_bar(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        egui::MenuBar::new().ui(ui, |ui| {
            ui.menu_button("File", |ui| {
                if ui.button("Open Catalog Folder...").clicked() {
                    self.open_root_dialog();
                    ui.close();
                }
                if ui.button("Reload").clicked() {
                    self.open_root(self.root.clone());
                    ui.close();
                }
                ui.separator();
                if ui.button("Exit").clicked() {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
            });
            ui.menu_button("View", |ui| {
                if ui.checkbox(&mut self.is_fullscreen, "Fullscreen (F)").changed() {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Fullscreen(self.is_fullscreen));
                    ui.close();
                }
            });
        });
    }

    fn collection_tabs(&mut self, ui: &mut egui::Ui) {
        let catalog = Arc::clone(&self.loaded.catalog);
        ui.horizontal_wrapped(|ui| {
            if catalog.is_empty() {
                ui.label(RichText::new("No Collections").monospace().color(DIM));
                return;
            }
            for col in catalog.collections() {
                let active = self.selection.collection_id() == Some(col.id.as_str());
                let label = RichText::new(col.name.to_uppercase()).monospace();
                if ui.selectable_label(active, label).clicked() && !active {
                    self.with_sink(|selection, sink| selection.set_collection(&col.id, sink));
                    self.status.set(format!("COLLECTION: {}", col.id), true);
                }
            }
        });
    }

    fn item_list(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(RichText::new("FILTER").monospace().color(DIM));
            let response = ui.text_edit_singleline(&mut self.filter);
            if response.changed() {
                let filter = self.filter.clone();
                self.with_sink(|selection, sink| selection.set_filter(&filter, None, sink));
            }
        });
        ui.label(RichText::new(format!("{} ITEMS", self.selection.filtered().len())).monospace().color(DIM));
        ui.separator();

        let items: Vec<Arc<Item>> = self.selection.filtered().to_vec();
        let scroll = std::mem::take(&mut self.scroll_to_selection);
        let mut clicked = None;
        egui::ScrollArea::vertical().auto_shrink([false, false]).show(ui, |ui| {
            if items.is_empty() {
                ui.label(RichText::new("NO ITEMS FOR THIS FILTER OR COLLECTION.").monospace().color(DIM));
                return;
            }
            for (i, item) in items.iter().enumerate() {
                let selected = self.highlight == Some(i);
                let text = format!("{}\n{}\n{}", item.name, item.id, item.tags.join(" * "));
                ui.horizontal(|ui| {
                    let response = ui.selectable_label(selected, RichText::new(text).monospace());
                    ui.label(RichText::new("PLAY").monospace().color(DIM));
                    if response.clicked() {
                        clicked = Some(i);
                    }
                    if selected && scroll {
                        response.scroll_to_me(Some(egui::Align::Center));
                    }
                });
            }
        });
        if let Some(i) = clicked {
            self.with_sink(|selection, sink| selection.select(i as i64, sink));
        }
    }

    fn details_panel(&self, ui: &mut egui::Ui) {
        let item = match &self.details {
            DetailsView::Placeholder { title, hint } => {
                ui.vertical_centered(|ui| {
                    ui.add_space(24.0);
                    ui.label(RichText::new(title.to_uppercase()).monospace().color(ACCENT));
                    ui.label(RichText::new(*hint).color(DIM));
                });
                return;
            }
            DetailsView::Item(item) => item,
        };

        egui::ScrollArea::vertical().show(ui, |ui| {
            egui::Grid::new("details_object").num_columns(2).show(ui, |ui| {
                ui.label(RichText::new("Object").color(DIM));
                ui.label(RichText::new(&item.name).strong());
                ui.end_row();
                ui.label(RichText::new("ID").color(DIM));
                ui.label(RichText::new(&item.id).monospace());
                ui.end_row();
            });
            ui.add_space(6.0);

            ui.horizontal_wrapped(|ui| {
                if item.tags.is_empty() {
                    chip(ui, "untagged");
                }
                for tag in &item.tags {
                    chip(ui, tag);
                }
            });
            ui.add_space(6.0);

            let description = if item.description.is_empty() { "No description provided." } else { item.description.as_str() };
            ui.label(RichText::new(description).monospace());
            ui.add_space(6.0);

            key_values(ui, "details_kv", &item.details, ("Details", "No details provided."));
            ui.add_space(6.0);
            ui.label(RichText::new("SPECS").color(DIM));
            key_values(ui, "details_specs", &item.specs, ("Status", "No specs provided."));
        });
    }

    fn status_bar(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let led = if self.status.lit { ACCENT } else { Color32::from_gray(60) };
            let (rect, _) = ui.allocate_exact_size(egui::vec2(10.0, 10.0), egui::Sense::hover());
            ui.painter().circle_filled(rect.center(), 4.0, led);
            ui.label(RichText::new(&self.status.text).monospace().color(HUD));
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let (data, _) = self.loaded.status();
                ui.label(RichText::new(data).monospace().color(DIM));
                if let Some(kind) = self.sessions.active_kind() {
                    ui.label(RichText::new(kind.to_uppercase()).monospace().color(DIM));
                }
            });
        });
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let (down, up, enter, fullscreen) = ctx.input(|i| {
            (
                i.key_pressed(Key::ArrowDown),
                i.key_pressed(Key::ArrowUp),
                i.key_pressed(Key::Enter),
                i.key_pressed(Key::F),
            )
        });
        if down {
            self.with_sink(|selection, sink| selection.step(1, sink));
        }
        if up {
            self.with_sink(|selection, sink| selection.step(-1, sink));
        }
        if enter {
            self.toggle_playback();
        }
        if fullscreen {
            self.is_fullscreen = !self.is_fullscreen;
            ctx.send_viewport_cmd(egui::ViewportCommand::Fullscreen(self.is_fullscreen));
        }
    }

    fn toggle_playback(&mut self) {
        if let Some(playing) = self.sessions.click() {
            self.show_playback(playing);
        }
    }

    fn show_playback(&mut self, playing: bool) {
        if playing {
            self.status.set("PLAY", true);
        } else {
            self.status.set("PAUSE", false);
        }
    }
}

fn chip(ui: &mut egui::Ui, text: &str) {
    egui::Frame::new()
        .stroke(egui::Stroke::new(1.0, DIM))
        .inner_margin(egui::Margin::symmetric(6, 2))
        .show(ui, |ui| {
            ui.label(RichText::new(text).monospace().size(11.0).color(HUD));
        });
}

fn key_values(ui: &mut egui::Ui, id: &str, rows: &[(String, String)], empty: (&str, &str)) {
    egui::Grid::new(id).num_columns(2).show(ui, |ui| {
        if rows.is_empty() {
            ui.label(RichText::new(empty.0).color(DIM));
            ui.label(empty.1);
            ui.end_row();
        }
        for (k, v) in rows {
            ui.label(RichText::new(k).color(DIM));
            ui.label(v);
            ui.end_row();
        }
    });
}

fn repaint(ctx: &egui::Context, request: FrameRequest) {
    match request {
        FrameRequest::Idle => {}
        FrameRequest::Animate => ctx.request_repaint(),
        FrameRequest::After(delay) => ctx.request_repaint_after(delay.max(Duration::from_millis(1))),
    }
}

impl eframe::App for MonospecApp {
    fn on_exit(&mut self) {
        self.sessions.teardown();
        self.pane.release(self.render_state.as_ref());
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let _span = tracing::info_span!("viewer_update").entered();

        let minimized = ctx.input(|i| i.viewport().minimized).unwrap_or(false);
        self.sessions.set_visible(!minimized);

        self.handle_keys(ctx);
        let mut request = self.sessions.tick(self.started.elapsed());

        TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            self.menu_bar(ctx, ui);
        });

        TopBottomPanel::top("collection_tabs").show(ctx, |ui| {
            self.collection_tabs(ui);
        });

        TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            self.status_bar(ui);
        });

        SidePanel::left("item_list")
            .default_width(280.0)
            .min_width(180.0)
            .resizable(true)
            .show(ctx, |ui| {
                self.item_list(ui);
            });

        SidePanel::right("details_panel")
            .default_width(300.0)
            .min_width(180.0)
            .resizable(true)
            .show(ctx, |ui| {
                self.details_panel(ui);
            });

        CentralPanel::default().frame(egui::Frame::NONE).show(ctx, |ui| {
            let output = self.pane.show(
                ui,
                &mut self.sessions,
                self.render_state.as_ref(),
                self.settings.pixel_ratio_cap,
            );
            request = request.merge(output.request);
            if let Some(playing) = output.toggled {
                self.show_playback(playing);
            }
        });

        repaint(ctx, request);
    }
}
