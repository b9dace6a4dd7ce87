use crate::{
    codec::CodecRef,
    context::ConversionContext,
    error::UnsupportedConversion,
    json::{
        JsonPointCodec, JsonScalarCodec,
        collection::{JsonArrayCodec, JsonMapCodec, JsonUdtCodec},
    },
    text::{
        JsonDocumentCodec, StringCodec,
        families::{
            BlobFamily, BooleanFamily, InetFamily, NumberFamily, PointFamily, TextualFamily,
            UuidFamily,
        },
        temporal::TemporalFamily,
    },
    writetime::WriteTimeCodec,
};
use model::{
    core::data_type::{DataType, TypeKind},
    records::external::ExternalFormat,
};
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

/// Builds a codec for one concrete type. Receives the registry so that
/// collection factories can resolve their element codecs.
pub type CodecFactory = fn(&CodecRegistry, &DataType) -> Result<CodecRef, UnsupportedConversion>;

/// Maps `(external format, internal type)` pairs to codecs.
///
/// Options are bound at construction; every codec handed out shares them.
/// Lookups for an unregistered pair fail with [`UnsupportedConversion`],
/// and a collection fails when any of its element types does.
pub struct CodecRegistry {
    context: Arc<ConversionContext>,
    factories: HashMap<(ExternalFormat, TypeKind), CodecFactory>,
}

impl CodecRegistry {
    /// A registry with codecs for every supported type in both formats.
    pub fn new(context: ConversionContext) -> Self {
        let mut registry = Self::empty(context);
        registry.register_text_codecs();
        registry.register_json_codecs();
        registry
    }

    pub fn empty(context: ConversionContext) -> Self {
        Self {
            context: Arc::new(context),
            factories: HashMap::new(),
        }
    }

    pub fn context(&self) -> &Arc<ConversionContext> {
        &self.context
    }

    pub fn register(&mut self, format: ExternalFormat, kind: TypeKind, factory: CodecFactory) {
        self.factories.insert((format, kind), factory);
    }

    pub fn supports(&self, format: ExternalFormat, data_type: &DataType) -> bool {
        self.codec_for(format, data_type).is_ok()
    }

    pub fn codec_for(
        &self,
        format: ExternalFormat,
        data_type: &DataType,
    ) -> Result<CodecRef, UnsupportedConversion> {
        let factory = self
            .factories
            .get(&(format, data_type.kind()))
            .ok_or_else(|| UnsupportedConversion {
                format,
                data_type: data_type.clone(),
            })?;

        let codec = factory(self, data_type)?;
        debug!(format = %format, data_type = %data_type, "Resolved codec");
        Ok(codec)
    }

    /// The codec for a field bound to the statement write time.
    pub fn write_time_codec(&self, format: ExternalFormat) -> Result<CodecRef, UnsupportedConversion> {
        let timestamp = self.codec_for(format, &DataType::Timestamp)?;
        Ok(Arc::new(WriteTimeCodec::new(timestamp)))
    }

    fn register_text_codecs(&mut self) {
        use ExternalFormat::Text;

        self.register(Text, TypeKind::Boolean, |r, t| {
            Ok(Arc::new(StringCodec::new(t.clone(), r.context.clone(), BooleanFamily)))
        });
        for kind in [
            TypeKind::Int,
            TypeKind::BigInt,
            TypeKind::Float,
            TypeKind::Double,
            TypeKind::Decimal,
        ] {
            self.register(Text, kind, |r, t| {
                Ok(Arc::new(StringCodec::new(t.clone(), r.context.clone(), NumberFamily)))
            });
        }
        self.register(Text, TypeKind::Text, |r, t| {
            Ok(Arc::new(StringCodec::new(t.clone(), r.context.clone(), TextualFamily)))
        });
        self.register(Text, TypeKind::Uuid, |r, t| {
            Ok(Arc::new(StringCodec::new(t.clone(), r.context.clone(), UuidFamily)))
        });
        self.register(Text, TypeKind::Inet, |r, t| {
            Ok(Arc::new(StringCodec::new(t.clone(), r.context.clone(), InetFamily)))
        });
        self.register(Text, TypeKind::Blob, |r, t| {
            Ok(Arc::new(StringCodec::new(t.clone(), r.context.clone(), BlobFamily)))
        });
        for kind in [TypeKind::Date, TypeKind::Time, TypeKind::Timestamp] {
            self.register(Text, kind, |r, t| {
                Ok(Arc::new(StringCodec::new(t.clone(), r.context.clone(), TemporalFamily)))
            });
        }
        self.register(Text, TypeKind::Point, |r, t| {
            Ok(Arc::new(StringCodec::new(t.clone(), r.context.clone(), PointFamily)))
        });
        for kind in [TypeKind::List, TypeKind::Set, TypeKind::Map, TypeKind::Udt] {
            self.register(Text, kind, |r, t| {
                let json = r.codec_for(ExternalFormat::Json, t)?;
                Ok(Arc::new(JsonDocumentCodec::new(t.clone(), r.context.clone(), json)))
            });
        }
    }

    fn register_json_codecs(&mut self) {
        use ExternalFormat::Json;

        for kind in [
            TypeKind::Boolean,
            TypeKind::Int,
            TypeKind::BigInt,
            TypeKind::Float,
            TypeKind::Double,
            TypeKind::Decimal,
            TypeKind::Text,
            TypeKind::Uuid,
            TypeKind::Inet,
            TypeKind::Date,
            TypeKind::Time,
            TypeKind::Timestamp,
            TypeKind::Blob,
        ] {
            self.register(Json, kind, |r, t| {
                let text = r.codec_for(ExternalFormat::Text, t)?;
                Ok(Arc::new(JsonScalarCodec::new(text)))
            });
        }
        self.register(Json, TypeKind::Point, |r, _| {
            Ok(Arc::new(JsonPointCodec::new(r.context.clone())))
        });
        for kind in [TypeKind::List, TypeKind::Set] {
            self.register(Json, kind, |r, t| {
                let (DataType::List(element) | DataType::Set(element)) = t else {
                    return Err(unsupported(ExternalFormat::Json, t));
                };
                let element = r.codec_for(ExternalFormat::Json, element)?;
                Ok(Arc::new(JsonArrayCodec::new(t.clone(), element)))
            });
        }
        self.register(Json, TypeKind::Map, |r, t| {
            let DataType::Map(key, value) = t else {
                return Err(unsupported(ExternalFormat::Json, t));
            };
            let key = r.codec_for(ExternalFormat::Json, key)?;
            let value = r.codec_for(ExternalFormat::Json, value)?;
            Ok(Arc::new(JsonMapCodec::new(t.clone(), key, value)))
        });
        self.register(Json, TypeKind::Udt, |r, t| {
            let DataType::Udt(udt) = t else {
                return Err(unsupported(ExternalFormat::Json, t));
            };
            let fields = udt
                .fields
                .iter()
                .map(|(name, field_type)| {
                    r.codec_for(ExternalFormat::Json, field_type)
                        .map(|codec| (name.clone(), codec))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Arc::new(JsonUdtCodec::new(t.clone(), fields)))
        });
    }
}

fn unsupported(format: ExternalFormat, data_type: &DataType) -> UnsupportedConversion {
    UnsupportedConversion {
        format,
        data_type: data_type.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{
        core::{geo::Point, value::Value},
        records::external::ExternalValue,
    };
    use std::net::IpAddr;

    fn sample_values() -> Vec<(DataType, Value)> {
        vec![
            (DataType::Boolean, Value::Boolean(true)),
            (DataType::Int, Value::Int(-7)),
            (DataType::BigInt, Value::BigInt(9_007_199_254_740_993)),
            (DataType::Float, Value::Float(1.25)),
            (DataType::Double, Value::Double(-0.1)),
            (DataType::Decimal, Value::Decimal("3.1400".parse().unwrap())),
            (DataType::Text, Value::Text("Île-de-France, \"FR\"".into())),
            (
                DataType::Uuid,
                Value::Uuid("2c5d1f8e-3b0a-4c6e-9d8e-0f1e2d3c4b5a".parse().unwrap()),
            ),
            (DataType::Inet, Value::Inet("2001:db8::1".parse::<IpAddr>().unwrap())),
            (DataType::Blob, Value::Blob(vec![0xde, 0xad])),
            (DataType::Point, Value::Point(Point::new(1.5, -2.0))),
            (
                DataType::Timestamp,
                Value::Timestamp("2017-11-30T13:46:56.5Z".parse().unwrap()),
            ),
            (
                DataType::Date,
                Value::Date("2017-11-30".parse().unwrap()),
            ),
            (
                DataType::Time,
                Value::Time("13:46:56.000001".parse().unwrap()),
            ),
            (
                DataType::Map(Box::new(DataType::Text), Box::new(DataType::List(Box::new(DataType::Int)))),
                Value::Map(vec![(
                    Value::Text("a".into()),
                    Value::List(vec![Value::Int(1), Value::Int(2)]),
                )]),
            ),
        ]
    }

    #[test]
    fn values_survive_a_trip_through_either_format() {
        let registry = CodecRegistry::new(ConversionContext::default());
        for format in [ExternalFormat::Text, ExternalFormat::Json] {
            for (data_type, value) in sample_values() {
                let codec = registry.codec_for(format, &data_type).unwrap();
                let external = codec.internal_to_external(Some(&value)).unwrap();
                let back = codec.external_to_internal(&external).unwrap();
                assert_eq!(back, Some(value), "{format} / {data_type}");
            }
        }
    }

    #[test]
    fn absent_values_render_as_the_external_null() {
        let registry = CodecRegistry::new(ConversionContext::default());
        let codec = registry.codec_for(ExternalFormat::Text, &DataType::Int).unwrap();
        assert_eq!(codec.internal_to_external(None).unwrap(), ExternalValue::Null);
    }

    #[test]
    fn unregistered_pairs_are_unsupported() {
        let mut registry = CodecRegistry::empty(ConversionContext::default());
        registry.register(ExternalFormat::Json, TypeKind::List, |r, t| {
            let DataType::List(element) = t else {
                return Err(unsupported(ExternalFormat::Json, t));
            };
            let element = r.codec_for(ExternalFormat::Json, element)?;
            Ok(Arc::new(JsonArrayCodec::new(t.clone(), element)))
        });

        let err = registry
            .codec_for(ExternalFormat::Text, &DataType::Int)
            .unwrap_err();
        assert_eq!(err.data_type, DataType::Int);

        // The list itself is registered but its element type is not.
        let err = registry
            .codec_for(ExternalFormat::Json, &DataType::List(Box::new(DataType::Uuid)))
            .unwrap_err();
        assert_eq!(err.data_type, DataType::Uuid);
        assert!(!registry.supports(ExternalFormat::Json, &DataType::Point));
    }
}
