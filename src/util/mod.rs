pub(crate) fn now_ms() -> i64 {
    js_sys::Date::now().round() as i64
}

pub(crate) fn now_secs() -> i64 {
    now_ms() / 1000
}
