pub mod keitaro;

pub use keitaro::KeitaroClient;
