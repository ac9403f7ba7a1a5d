pub fn fixed_point_2_decimal_to_str(value: u64) -> String {
    format!("{}.{:02}", value / 100, value % 100)
}

pub fn signed_fixed_point_2_decimal_to_str(value: i64) -> String {
    format!(
        "{}{}",
        get_sign_prefix(value),
        fixed_point_2_decimal_to_str(value.unsigned_abs())
    )
}

fn get_sign_prefix(value: i64) -> &'static str {
    if value < 0 {
        "-"
    } else {
        ""
    }
}
