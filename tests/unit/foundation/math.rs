use super::*;

#[test]
fn mul_div255_rounds_to_nearest() {
    assert_eq!(mul_div255_u16(255, 255), 255);
    assert_eq!(mul_div255_u16(255, 0), 0);
    assert_eq!(mul_div255_u16(128, 255), 128);
    assert_eq!(mul_div255_u16(255, 128), 128);
}

#[test]
fn blend_over_endpoints_are_exact() {
    assert_eq!(blend_over_u8(10, 200, 255), 200);
    assert_eq!(blend_over_u8(10, 200, 0), 10);
    assert_eq!(blend_over_u8(0, 255, 128), 128);
}
