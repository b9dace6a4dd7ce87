use super::TextFamily;
use crate::context::ConversionContext;
use bigdecimal::{BigDecimal, ToPrimitive, Zero};
use model::core::{data_type::DataType, geo::Point, value::Value};
use std::{net::IpAddr, str::FromStr};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct BooleanFamily;

#[derive(Debug, Clone, Copy)]
pub struct NumberFamily;

#[derive(Debug, Clone, Copy)]
pub struct TextualFamily;

#[derive(Debug, Clone, Copy)]
pub struct UuidFamily;

#[derive(Debug, Clone, Copy)]
pub struct InetFamily;

#[derive(Debug, Clone, Copy)]
pub struct BlobFamily;

#[derive(Debug, Clone, Copy)]
pub struct PointFamily;

impl TextFamily for BooleanFamily {
    fn parse(&self, ctx: &ConversionContext, _: &DataType, raw: &str) -> Result<Value, String> {
        ctx.parse_boolean(raw).map(Value::Boolean).ok_or_else(|| {
            let accepted = ctx
                .boolean_words
                .iter()
                .map(|(yes, no)| format!("{yes}/{no}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!("expected one of {accepted}")
        })
    }

    fn render(&self, _: &ConversionContext, value: &Value) -> Result<String, String> {
        Ok(value.to_string())
    }
}

impl TextFamily for NumberFamily {
    fn parse(
        &self,
        ctx: &ConversionContext,
        data_type: &DataType,
        raw: &str,
    ) -> Result<Value, String> {
        let normalized = ctx.normalize_number(raw);
        match data_type {
            DataType::Float => normalized
                .parse::<f32>()
                .map(Value::Float)
                .map_err(|e| e.to_string()),
            DataType::Double => normalized
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|e| e.to_string()),
            DataType::Decimal => BigDecimal::from_str(&normalized)
                .map(Value::Decimal)
                .map_err(|e| e.to_string()),
            DataType::Int => {
                let n = parse_integral(&normalized)?;
                n.to_i32()
                    .map(Value::Int)
                    .ok_or_else(|| format!("{n} does not fit in a 32-bit integer"))
            }
            DataType::BigInt => {
                let n = parse_integral(&normalized)?;
                n.to_i64()
                    .map(Value::BigInt)
                    .ok_or_else(|| format!("{n} does not fit in a 64-bit integer"))
            }
            other => Err(format!("{other} is not numeric")),
        }
    }

    fn render(&self, _: &ConversionContext, value: &Value) -> Result<String, String> {
        Ok(value.to_string())
    }
}

/// Largest power of ten an `i64` can hold.
const MAX_INTEGRAL_EXPONENT: i64 = 18;

/// Integers accept any decimal notation that loses nothing, so `42.0` is
/// allowed and `42.5` is not.
///
/// The exponent is checked before anything rescales the value: `1e999999999`
/// is rejected without materializing its digits.
fn parse_integral(normalized: &str) -> Result<BigDecimal, String> {
    let n = BigDecimal::from_str(normalized).map_err(|e| e.to_string())?;
    if n.is_zero() {
        return Ok(BigDecimal::zero());
    }
    let (mantissa, scale) = n.as_bigint_and_exponent();
    let digits = mantissa.to_string().trim_start_matches('-').len() as i64;
    if scale < -MAX_INTEGRAL_EXPONENT || digits.saturating_sub(scale) > MAX_INTEGRAL_EXPONENT + 1 {
        return Err(format!("{normalized} is out of the 64-bit integer range"));
    }
    if scale > digits {
        return Err(format!("{normalized} has a fractional part"));
    }
    if n.is_integer() {
        Ok(n)
    } else {
        Err(format!("{normalized} has a fractional part"))
    }
}

impl TextFamily for TextualFamily {
    fn parse(&self, _: &ConversionContext, _: &DataType, raw: &str) -> Result<Value, String> {
        Ok(Value::Text(raw.to_string()))
    }

    fn render(&self, _: &ConversionContext, value: &Value) -> Result<String, String> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            other => Ok(other.to_string()),
        }
    }
}

impl TextFamily for UuidFamily {
    fn parse(&self, _: &ConversionContext, _: &DataType, raw: &str) -> Result<Value, String> {
        Uuid::parse_str(raw)
            .map(Value::Uuid)
            .map_err(|e| e.to_string())
    }

    fn render(&self, _: &ConversionContext, value: &Value) -> Result<String, String> {
        Ok(value.to_string())
    }
}

impl TextFamily for InetFamily {
    fn parse(&self, _: &ConversionContext, _: &DataType, raw: &str) -> Result<Value, String> {
        IpAddr::from_str(raw.trim_matches('\''))
            .map(Value::Inet)
            .map_err(|e| e.to_string())
    }

    fn render(&self, _: &ConversionContext, value: &Value) -> Result<String, String> {
        match value {
            Value::Inet(addr) => Ok(addr.to_string()),
            other => Err(format!("not an address: {other}")),
        }
    }
}

impl TextFamily for BlobFamily {
    fn parse(&self, _: &ConversionContext, _: &DataType, raw: &str) -> Result<Value, String> {
        let hex = raw
            .strip_prefix("0x")
            .or_else(|| raw.strip_prefix("0X"))
            .ok_or_else(|| "expected a 0x-prefixed hex literal".to_string())?;
        decode_hex(hex).map(Value::Blob)
    }

    fn render(&self, _: &ConversionContext, value: &Value) -> Result<String, String> {
        Ok(value.to_string())
    }
}

impl TextFamily for PointFamily {
    fn parse(&self, _: &ConversionContext, _: &DataType, raw: &str) -> Result<Value, String> {
        Point::parse(raw).map(Value::Point).map_err(|e| e.to_string())
    }

    fn render(&self, _: &ConversionContext, value: &Value) -> Result<String, String> {
        match value {
            Value::Point(p) => Ok(p.as_geo_json().to_string()),
            other => Err(format!("not a point: {other}")),
        }
    }
}

fn decode_hex(hex: &str) -> Result<Vec<u8>, String> {
    if hex.len() % 2 != 0 {
        return Err("hex literal has an odd number of digits".to_string());
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            hex.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| format!("invalid hex digits at offset {i}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_decoding() {
        assert_eq!(decode_hex("00ff10").unwrap(), vec![0x00, 0xff, 0x10]);
        assert_eq!(decode_hex("").unwrap(), Vec::<u8>::new());
        assert!(decode_hex("zz").is_err());
        assert!(decode_hex("abc").is_err());
    }

    #[test]
    fn integral_numbers_honor_grouping() {
        let ctx = ConversionContext {
            number_format: crate::context::NumberFormat {
                grouping_separator: Some(','),
                decimal_separator: '.',
            },
            ..Default::default()
        };
        assert_eq!(
            NumberFamily.parse(&ctx, &DataType::BigInt, "1,234,567"),
            Ok(Value::BigInt(1_234_567))
        );
    }

    #[test]
    fn huge_exponents_fail_fast() {
        let ctx = ConversionContext::default();
        let started = std::time::Instant::now();
        for raw in ["1e999999999", "1e-999999999", "-7E+999999999"] {
            assert!(NumberFamily.parse(&ctx, &DataType::Int, raw).is_err());
            assert!(NumberFamily.parse(&ctx, &DataType::BigInt, raw).is_err());
        }
        assert!(started.elapsed() < std::time::Duration::from_secs(1));

        assert_eq!(
            NumberFamily.parse(&ctx, &DataType::BigInt, "1.5e1"),
            Ok(Value::BigInt(15))
        );
        assert_eq!(
            NumberFamily.parse(&ctx, &DataType::BigInt, "9.223372036854775807e18"),
            Ok(Value::BigInt(i64::MAX))
        );
        assert_eq!(
            NumberFamily.parse(&ctx, &DataType::Int, "0e999999999"),
            Ok(Value::Int(0))
        );
        assert!(NumberFamily.parse(&ctx, &DataType::BigInt, "1e19").is_err());
        assert!(NumberFamily.parse(&ctx, &DataType::Int, "42.5").is_err());
    }

    #[test]
    fn booleans_list_accepted_words_on_failure() {
        let ctx = ConversionContext::default();
        let err = BooleanFamily
            .parse(&ctx, &DataType::Boolean, "maybe")
            .unwrap_err();
        assert!(err.contains("yes/no"));
    }
}
