mod endpoints;
mod helpers;
mod lifecycle;
