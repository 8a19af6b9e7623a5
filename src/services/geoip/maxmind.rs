//! MaxMind GeoLite2 数据库实现
//!
//! Country 与 City 数据库都可以使用，只读取国家字段。

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use maxminddb::Reader;
use tracing::trace;

use super::provider::CountrySource;
use crate::storage::CountryCode;

pub struct MaxMindProvider {
    reader: Arc<Reader<Vec<u8>>>,
}

impl MaxMindProvider {
    pub fn new(path: &str) -> Result<Self, maxminddb::MaxMindDbError> {
        let reader = Reader::open_readfile(path)?;
        Ok(Self {
            reader: Arc::new(reader),
        })
    }
}

#[async_trait]
impl CountrySource for MaxMindProvider {
    async fn lookup(&self, ip: IpAddr) -> Option<CountryCode> {
        let result = self.reader.lookup(ip).ok()?;
        let record: maxminddb::geoip2::Country = result.decode().ok()??;

        let country = record.country.iso_code.map(CountryCode::normalize);
        trace!("MaxMind lookup for {}: country={:?}", ip, country);
        country
    }

    fn name(&self) -> &'static str {
        "MaxMind"
    }
}
