use rocket::Route;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::common::photo::Photo;

mod admin;
mod public;
mod voter;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(public::routes());
    routes.extend(voter::routes());
    routes
}

/// Reject uploads over the configured size limit.
fn check_image_size(photo: &Photo, config: &Config) -> Result<()> {
    if photo.len() > config.max_image_bytes() {
        return Err(Error::BadRequest(format!(
            "Image of {} bytes exceeds the {} byte limit",
            photo.len(),
            config.max_image_bytes()
        )));
    }
    Ok(())
}
