#![allow(dead_code)]

pub mod http;
pub mod platescan_env;

use std::time::{Duration, Instant};

use platescan::image_file::ImageFile;
use platescan::upload::UploadController;

const PUMP_TIMEOUT: Duration = Duration::from_secs(5);

/// A small solid-color PNG wrapped as a picked file.
pub fn png_file(name: &str) -> ImageFile {
    let image = image::RgbaImage::from_pixel(8, 6, image::Rgba([220, 180, 90, 255]));
    let mut bytes = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .expect("encode png");
    ImageFile::new(name, bytes.into_inner())
}

/// Poll the controller until `done` holds.
pub fn pump_until(controller: &mut UploadController, done: impl Fn(&UploadController) -> bool) {
    let deadline = Instant::now() + PUMP_TIMEOUT;
    loop {
        controller.poll();
        if done(controller) {
            return;
        }
        assert!(Instant::now() < deadline, "controller never settled");
        std::thread::sleep(Duration::from_millis(2));
    }
}
