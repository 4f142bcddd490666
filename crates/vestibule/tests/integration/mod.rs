mod identity;
mod pipeline;
mod redirects;
