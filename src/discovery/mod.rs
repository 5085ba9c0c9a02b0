//! mDNS advertisement of this remote

mod advertiser;


pub use advertiser::{
    AdvertiserError, TOUCH_REMOTE_SERVICE_TYPE, TouchRemoteAdvertiser, TouchRemoteRecord,
    TxtRecordBuilder, local_host_name,
};
