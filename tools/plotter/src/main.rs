use crossbeam_queue::ArrayQueue;
use eframe::{run_native, App, NativeOptions};
use egui::Color32;
use egui_plot::{Legend, Plot, Points};
use lighthouse_algo::pose_record::{PoseRecord, PoseSource, POSE_RECORD_SIZE};
use probe_rs::rtt::Rtt;
use probe_rs::{Permissions, Probe};
use std::collections::{BTreeSet, VecDeque};
use std::time::Duration;
use std::{
    sync::{Arc, Mutex},
    thread,
};

const HISTORY_LENGTH: usize = 2000;
const POSE_CHANNEL: usize = 1; // Up channel 0 carries defmt logs
const BUFFER_MULTIPLE: usize = 64;
const BUFFER_SIZE: usize = POSE_RECORD_SIZE * BUFFER_MULTIPLE;
const QUEUE_SIZE: usize = 8192;

struct PlotApp {
    data_queue: Arc<ArrayQueue<PoseRecord>>,
    paused: Arc<Mutex<bool>>,
    tracks: [VecDeque<PoseRecord>; 3], // One track per pose source
    visible: BTreeSet<PoseSource>,
    history_length: usize,
    last_timestamp_ms: u32,
}

impl PlotApp {
    fn new(data_queue: Arc<ArrayQueue<PoseRecord>>, paused: Arc<Mutex<bool>>) -> Self {
        Self {
            data_queue,
            paused,
            tracks: Default::default(),
            visible: PoseSource::ALL.into_iter().collect(),
            history_length: HISTORY_LENGTH,
            last_timestamp_ms: 0,
        }
    }

    fn drain_queue(&mut self) {
        while let Some(record) = self.data_queue.pop() {
            let Some(source) = record.source() else {
                eprintln!("Skipping record with unknown id {}", record.id);
                continue;
            };
            self.last_timestamp_ms = record.timestamp_ms;
            self.tracks[source as usize].push_back(record);
        }

        // Maintain history length
        for track in self.tracks.iter_mut() {
            while track.len() > self.history_length {
                track.pop_front();
            }
        }
    }

    fn clear(&mut self) {
        for track in self.tracks.iter_mut() {
            track.clear();
        }
    }
}

impl App for PlotApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let paused = *self.paused.lock().unwrap();

        egui::CentralPanel::default().show(ctx, |ui| {
            // Add controls panel above the plot
            ui.horizontal(|ui| {
                if ui.button(if paused { "Resume" } else { "Pause" }).clicked() {
                    let mut paused = self.paused.lock().unwrap();
                    *paused = !*paused;
                }

                if ui.button("Clear").clicked() {
                    self.clear();
                }

                ui.add(
                    egui::Slider::new(&mut self.history_length, 100..=20000)
                        .text("Track length")
                        .logarithmic(true),
                );

                for source in PoseSource::ALL {
                    let mut visible = self.visible.contains(&source);
                    if ui.checkbox(&mut visible, source.label()).changed() {
                        if visible {
                            self.visible.insert(source);
                        } else {
                            self.visible.remove(&source);
                        }
                    }
                }

                ui.label(format!("t = {:.1} s", self.last_timestamp_ms as f32 / 1000.0));
            });

            if !paused {
                self.drain_queue();
            }

            Plot::new("Robot track")
                .data_aspect(1.0)
                .legend(Legend::default())
                .x_axis_label("x, mm")
                .y_axis_label("y, mm")
                .show(ui, |plot_ui| {
                    for source in PoseSource::ALL {
                        if !self.visible.contains(&source) {
                            continue;
                        }
                        let track = &self.tracks[source as usize];
                        let points: Vec<[f64; 2]> = track
                            .iter()
                            .map(|r| [r.x_mm as f64, r.y_mm as f64])
                            .collect();
                        plot_ui.points(
                            Points::new(points)
                                .name(source.label())
                                .color(source_to_color(source))
                                .radius(1.5),
                        );
                    }
                });
        });

        if !paused {
            ctx.request_repaint();
        }
    }
}

/// Splits a byte stream into pose records, keeping a trailing partial record for the next read.
fn decode_records(pending: &mut Vec<u8>, data_queue: &ArrayQueue<PoseRecord>) {
    let whole = pending.len() - pending.len() % POSE_RECORD_SIZE;
    for chunk in pending[..whole].chunks_exact(POSE_RECORD_SIZE) {
        if let Ok(bytes) = <&[u8; POSE_RECORD_SIZE]>::try_from(chunk) {
            if data_queue.push(PoseRecord::from_bytes(bytes)).is_err() {
                // Queue is full, the UI is not keeping up
                break;
            }
        }
    }
    pending.drain(..whole);
}

fn connect_and_read(
    data_queue: Arc<ArrayQueue<PoseRecord>>,
    paused: Arc<Mutex<bool>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let probe = Probe::list_all()
        .first()
        .ok_or("No debug probe found")?
        .open()?;
    let mut session = probe.attach("STM32G431CBTx", Permissions::default())?;
    let memory_map = session.target().memory_map.clone();
    let mut core = session.core(0)?;
    let mut rtt = Rtt::attach(&mut core, &memory_map)?;

    let mut buf = vec![0u8; BUFFER_SIZE];
    let mut pending = Vec::with_capacity(BUFFER_SIZE * 2);

    // Get the channel once, outside the loop
    let channel = rtt
        .up_channels()
        .take(POSE_CHANNEL)
        .ok_or("Failed to get pose RTT channel")?;

    loop {
        if paused.try_lock().map(|guard| *guard).unwrap_or(false) {
            thread::sleep(Duration::from_millis(100));
            continue;
        }

        match channel.read(&mut core, &mut buf) {
            Ok(0) => thread::sleep(Duration::from_millis(5)),
            Ok(count) => {
                pending.extend_from_slice(&buf[..count]);
                decode_records(&mut pending, &data_queue);
            }
            Err(e) => {
                eprintln!("Error reading RTT channel: {:?}", e);
                thread::sleep(Duration::from_millis(10));
            }
        }
    }
}

fn source_to_color(source: PoseSource) -> Color32 {
    // Spread the sources evenly around the hue circle
    let hue = source as u8 as f32 / PoseSource::ALL.len() as f32;
    // Keep saturation and value high for good visibility
    let (r, g, b) = hsv_to_rgb(hue, 0.8, 0.9);
    Color32::from_rgb(r, g, b)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (u8, u8, u8) {
    let h = h * 6.0;
    let i = h.floor();
    let f = h - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    let (r, g, b) = match i as i32 % 6 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };

    ((r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8)
}

fn main() {
    let data_queue = Arc::new(ArrayQueue::new(QUEUE_SIZE));
    let paused = Arc::new(Mutex::new(false));

    let data_queue_clone = data_queue.clone();
    let paused_clone = paused.clone();

    thread::spawn(move || {
        if let Err(e) = connect_and_read(data_queue_clone, paused_clone) {
            eprintln!("Error in data collection: {:?}", e);
        }
    });

    let app = PlotApp::new(data_queue, paused);

    let options = NativeOptions::default();
    run_native("Lighthouse track", options, Box::new(|_cc| Ok(Box::new(app)))).unwrap();
}
