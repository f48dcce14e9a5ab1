//! PDF page rendering into display-sized chunks

mod chunk;
mod render;

pub use chunk::{Band, MAX_CHUNK_HEIGHT, band_rows, split_into_bands};
pub use render::{
    FULL_PAGE_FILE, RENDER_DPI, RenderFault, RenderedPage, rasterize, render, render_page,
};
