//! Serde bridge between native Rust values and [`TierkreisValue`].
//!
//! Serializing into a `TierkreisValue` follows these rules:
//! - booleans, strings, `char`, floats and integers that fit in `i64` map to primitives
//! - sequences map to `Vec`, 2-tuples to `Pair`, other tuples to `Vec`
//! - fixed-size arrays serialize as tuples, so `[T; 2]` becomes a `Pair`;
//!   pass a slice or `Vec` where a two-element `Vec` is wanted
//! - maps map to `Map`, structs to `Struct`
//! - enum variants map to `Variant`, with an empty struct as the unit payload
//! - `Some(x)` is `x`; unit, `None` and raw bytes are rejected
//!
//! Deserializing walks the value tree the other way round, so every value
//! accepted by the serializer can be read back into the same native type.

use super::values::{IncompatibleType, StructValue, TierkreisValue, ValueError};
use serde::de::value::{MapDeserializer, SeqDeserializer, StringDeserializer};
use serde::de::{self, DeserializeSeed, EnumAccess, IntoDeserializer, VariantAccess, Visitor};
use serde::ser::{self, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

impl ser::Error for IncompatibleType {
    fn custom<T: Display>(msg: T) -> Self {
        IncompatibleType(msg.to_string())
    }
}

impl de::Error for ValueError {
    fn custom<T: Display>(msg: T) -> Self {
        ValueError::Native(msg.to_string())
    }
}

fn integer<T>(value: T) -> Result<TierkreisValue, IncompatibleType>
where
    T: TryInto<i64> + Display + Copy,
{
    value
        .try_into()
        .map(TierkreisValue::Int)
        .map_err(|_| IncompatibleType(format!("integer {} outside the 64-bit signed range", value)))
}

/// Serializer producing a [`TierkreisValue`].
pub struct ValueSerializer;

impl ser::Serializer for ValueSerializer {
    type Ok = TierkreisValue;
    type Error = IncompatibleType;

    type SerializeSeq = SerializeVec;
    type SerializeTuple = SerializeTuple;
    type SerializeTupleStruct = SerializeVec;
    type SerializeTupleVariant = SerializeTupleVariant;
    type SerializeMap = SerializeMap;
    type SerializeStruct = SerializeStruct;
    type SerializeStructVariant = SerializeStructVariant;

    fn serialize_bool(self, v: bool) -> Result<TierkreisValue, IncompatibleType> {
        Ok(TierkreisValue::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<TierkreisValue, IncompatibleType> {
        Ok(TierkreisValue::Int(v.into()))
    }

    fn serialize_i16(self, v: i16) -> Result<TierkreisValue, IncompatibleType> {
        Ok(TierkreisValue::Int(v.into()))
    }

    fn serialize_i32(self, v: i32) -> Result<TierkreisValue, IncompatibleType> {
        Ok(TierkreisValue::Int(v.into()))
    }

    fn serialize_i64(self, v: i64) -> Result<TierkreisValue, IncompatibleType> {
        Ok(TierkreisValue::Int(v))
    }

    fn serialize_i128(self, v: i128) -> Result<TierkreisValue, IncompatibleType> {
        integer(v)
    }

    fn serialize_u8(self, v: u8) -> Result<TierkreisValue, IncompatibleType> {
        Ok(TierkreisValue::Int(v.into()))
    }

    fn serialize_u16(self, v: u16) -> Result<TierkreisValue, IncompatibleType> {
        Ok(TierkreisValue::Int(v.into()))
    }

    fn serialize_u32(self, v: u32) -> Result<TierkreisValue, IncompatibleType> {
        Ok(TierkreisValue::Int(v.into()))
    }

    fn serialize_u64(self, v: u64) -> Result<TierkreisValue, IncompatibleType> {
        integer(v)
    }

    fn serialize_u128(self, v: u128) -> Result<TierkreisValue, IncompatibleType> {
        integer(v)
    }

    fn serialize_f32(self, v: f32) -> Result<TierkreisValue, IncompatibleType> {
        Ok(TierkreisValue::Float(v.into()))
    }

    fn serialize_f64(self, v: f64) -> Result<TierkreisValue, IncompatibleType> {
        Ok(TierkreisValue::Float(v))
    }

    fn serialize_char(self, v: char) -> Result<TierkreisValue, IncompatibleType> {
        Ok(TierkreisValue::Str(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<TierkreisValue, IncompatibleType> {
        Ok(TierkreisValue::Str(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<TierkreisValue, IncompatibleType> {
        Err(IncompatibleType(format!("raw bytes ({} bytes)", v.len())))
    }

    fn serialize_none(self) -> Result<TierkreisValue, IncompatibleType> {
        Err(IncompatibleType("a missing optional value".to_string()))
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<TierkreisValue, IncompatibleType> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<TierkreisValue, IncompatibleType> {
        Err(IncompatibleType("the unit value".to_string()))
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<TierkreisValue, IncompatibleType> {
        Ok(TierkreisValue::Struct(StructValue::default()))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<TierkreisValue, IncompatibleType> {
        Ok(TierkreisValue::Variant(
            variant.to_string(),
            Box::new(TierkreisValue::Struct(StructValue::default())),
        ))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<TierkreisValue, IncompatibleType> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<TierkreisValue, IncompatibleType> {
        Ok(TierkreisValue::Variant(
            variant.to_string(),
            Box::new(value.serialize(self)?),
        ))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SerializeVec, IncompatibleType> {
        Ok(SerializeVec {
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SerializeTuple, IncompatibleType> {
        Ok(SerializeTuple {
            items: Vec::with_capacity(len),
        })
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SerializeVec, IncompatibleType> {
        ser::Serializer::serialize_seq(self, Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SerializeTupleVariant, IncompatibleType> {
        Ok(SerializeTupleVariant {
            tag: variant,
            items: Vec::with_capacity(len),
        })
    }

    fn serialize_map(self, len: Option<usize>) -> Result<SerializeMap, IncompatibleType> {
        Ok(SerializeMap {
            entries: Vec::with_capacity(len.unwrap_or(0)),
            next_key: None,
        })
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<SerializeStruct, IncompatibleType> {
        Ok(SerializeStruct {
            fields: BTreeMap::new(),
        })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<SerializeStructVariant, IncompatibleType> {
        Ok(SerializeStructVariant {
            tag: variant,
            fields: BTreeMap::new(),
        })
    }
}

pub struct SerializeVec {
    items: Vec<TierkreisValue>,
}

impl ser::SerializeSeq for SerializeVec {
    type Ok = TierkreisValue;
    type Error = IncompatibleType;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), IncompatibleType> {
        self.items.push(value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<TierkreisValue, IncompatibleType> {
        Ok(TierkreisValue::Vec(self.items))
    }
}

impl ser::SerializeTupleStruct for SerializeVec {
    type Ok = TierkreisValue;
    type Error = IncompatibleType;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), IncompatibleType> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<TierkreisValue, IncompatibleType> {
        ser::SerializeSeq::end(self)
    }
}

pub struct SerializeTuple {
    items: Vec<TierkreisValue>,
}

impl ser::SerializeTuple for SerializeTuple {
    type Ok = TierkreisValue;
    type Error = IncompatibleType;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), IncompatibleType> {
        self.items.push(value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(mut self) -> Result<TierkreisValue, IncompatibleType> {
        if self.items.len() == 2 {
            let second = self.items.pop();
            let first = self.items.pop();
            if let (Some(first), Some(second)) = (first, second) {
                return Ok(TierkreisValue::pair(first, second));
            }
        }
        Ok(TierkreisValue::Vec(self.items))
    }
}

pub struct SerializeTupleVariant {
    tag: &'static str,
    items: Vec<TierkreisValue>,
}

impl ser::SerializeTupleVariant for SerializeTupleVariant {
    type Ok = TierkreisValue;
    type Error = IncompatibleType;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), IncompatibleType> {
        self.items.push(value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<TierkreisValue, IncompatibleType> {
        Ok(TierkreisValue::Variant(
            self.tag.to_string(),
            Box::new(TierkreisValue::Vec(self.items)),
        ))
    }
}

pub struct SerializeMap {
    entries: Vec<(TierkreisValue, TierkreisValue)>,
    next_key: Option<TierkreisValue>,
}

impl ser::SerializeMap for SerializeMap {
    type Ok = TierkreisValue;
    type Error = IncompatibleType;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), IncompatibleType> {
        self.next_key = Some(key.serialize(ValueSerializer)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), IncompatibleType> {
        let key = self
            .next_key
            .take()
            .ok_or_else(|| IncompatibleType("a map value without a key".to_string()))?;
        self.entries.push((key, value.serialize(ValueSerializer)?));
        Ok(())
    }

    fn end(self) -> Result<TierkreisValue, IncompatibleType> {
        Ok(TierkreisValue::Map(self.entries))
    }
}

pub struct SerializeStruct {
    fields: BTreeMap<String, TierkreisValue>,
}

impl ser::SerializeStruct for SerializeStruct {
    type Ok = TierkreisValue;
    type Error = IncompatibleType;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), IncompatibleType> {
        self.fields.insert(key.to_string(), value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<TierkreisValue, IncompatibleType> {
        Ok(TierkreisValue::Struct(StructValue::new(self.fields)))
    }
}

pub struct SerializeStructVariant {
    tag: &'static str,
    fields: BTreeMap<String, TierkreisValue>,
}

impl ser::SerializeStructVariant for SerializeStructVariant {
    type Ok = TierkreisValue;
    type Error = IncompatibleType;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), IncompatibleType> {
        self.fields.insert(key.to_string(), value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<TierkreisValue, IncompatibleType> {
        Ok(TierkreisValue::Variant(
            self.tag.to_string(),
            Box::new(TierkreisValue::Struct(StructValue::new(self.fields))),
        ))
    }
}

impl<'de> IntoDeserializer<'de, ValueError> for TierkreisValue {
    type Deserializer = Self;

    fn into_deserializer(self) -> Self {
        self
    }
}

fn visit_seq<'de, V, I>(items: I, visitor: V) -> Result<V::Value, ValueError>
where
    V: Visitor<'de>,
    I: Iterator<Item = TierkreisValue>,
{
    let mut deserializer: SeqDeserializer<I, ValueError> = SeqDeserializer::new(items);
    let value = visitor.visit_seq(&mut deserializer)?;
    deserializer.end()?;
    Ok(value)
}

fn visit_map<'de, V, I>(entries: I, visitor: V) -> Result<V::Value, ValueError>
where
    V: Visitor<'de>,
    I: Iterator<Item = (TierkreisValue, TierkreisValue)>,
{
    let mut deserializer: MapDeserializer<'de, I, ValueError> = MapDeserializer::new(entries);
    let value = visitor.visit_map(&mut deserializer)?;
    deserializer.end()?;
    Ok(value)
}

impl<'de> de::Deserializer<'de> for TierkreisValue {
    type Error = ValueError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ValueError> {
        match self {
            TierkreisValue::Bool(value) => visitor.visit_bool(value),
            TierkreisValue::Int(value) => visitor.visit_i64(value),
            TierkreisValue::Float(value) => visitor.visit_f64(value),
            TierkreisValue::Str(value) => visitor.visit_string(value),
            TierkreisValue::Pair(pair) => {
                let (first, second) = *pair;
                visit_seq([first, second].into_iter(), visitor)
            }
            TierkreisValue::Vec(items) => visit_seq(items.into_iter(), visitor),
            TierkreisValue::Map(entries) => visit_map(entries.into_iter(), visitor),
            TierkreisValue::Struct(fields) => visit_map(
                fields
                    .into_values()
                    .into_iter()
                    .map(|(name, value)| (TierkreisValue::Str(name), value)),
                visitor,
            ),
            TierkreisValue::Graph(_) => Err(ValueError::Native(
                "graph values have no native representation".to_string(),
            )),
            TierkreisValue::Variant(tag, value) => visitor.visit_enum(VariantDeserializer {
                tag,
                value: *value,
            }),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ValueError> {
        visitor.visit_some(self)
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, ValueError> {
        match self {
            TierkreisValue::Struct(fields) if fields.is_empty() => visitor.visit_unit(),
            other => de::Deserializer::deserialize_any(other, visitor),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, ValueError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ValueError> {
        match self {
            TierkreisValue::Variant(tag, value) => visitor.visit_enum(VariantDeserializer {
                tag,
                value: *value,
            }),
            TierkreisValue::Str(tag) => visitor.visit_enum(StringDeserializer::<ValueError>::new(tag)),
            other => Err(ValueError::TypeMismatch {
                expected: "Variant".to_string(),
                found: other.kind_name().to_string(),
            }),
        }
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit seq tuple tuple_struct map struct identifier ignored_any
    }
}

struct VariantDeserializer {
    tag: String,
    value: TierkreisValue,
}

impl<'de> EnumAccess<'de> for VariantDeserializer {
    type Error = ValueError;
    type Variant = VariantPayload;

    fn variant_seed<V: DeserializeSeed<'de>>(self, seed: V) -> Result<(V::Value, VariantPayload), ValueError> {
        let tag = seed.deserialize(StringDeserializer::<ValueError>::new(self.tag))?;
        Ok((tag, VariantPayload { value: self.value }))
    }
}

struct VariantPayload {
    value: TierkreisValue,
}

impl<'de> VariantAccess<'de> for VariantPayload {
    type Error = ValueError;

    fn unit_variant(self) -> Result<(), ValueError> {
        match self.value {
            TierkreisValue::Struct(fields) if fields.is_empty() => Ok(()),
            other => Err(ValueError::TypeMismatch {
                expected: "empty struct".to_string(),
                found: other.kind_name().to_string(),
            }),
        }
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value, ValueError> {
        seed.deserialize(self.value)
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, ValueError> {
        de::Deserializer::deserialize_any(self.value, visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ValueError> {
        de::Deserializer::deserialize_any(self.value, visitor)
    }
}
