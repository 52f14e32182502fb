use crate::errors::DexError;
use std::convert::TryFrom;
use std::fmt;

/// One entry of the dex map list: a section type, its item count and the
/// offset of its first item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapItem {
    pub(crate) typ: MapItemType,
    pub(crate) size: usize,
    pub(crate) offset: usize,
}

impl MapItem {
    pub(crate) const SIZE: usize = 12;

    #[inline]
    #[must_use]
    pub const fn typ(&self) -> MapItemType {
        self.typ
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    #[inline]
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }
}

#[derive(Debug, Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub enum MapItemType {
    HeaderItem,
    StringIdItem,
    TypeIdItem,
    ProtoIdItem,
    FieldIdItem,
    MethodIdItem,
    ClassDefItem,
    CallSiteIdItem,
    MethodHandleItem,
    MapList,
    TypeList,
    AnnotationSetRefList,
    AnnotationSetItem,
    ClassDataItem,
    CodeItem,
    StringDataItem,
    DebugInfoItem,
    AnnotationItem,
    EncodedArrayItem,
    AnnotationsDirectoryItem,
    HiddenapiClassDataItem,
}

impl fmt::Display for MapItemType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::HeaderItem => "HEADER_ITEM",
            Self::StringIdItem => "STRING_ID_ITEM",
            Self::TypeIdItem => "TYPE_ID_ITEM",
            Self::ProtoIdItem => "PROTO_ID_ITEM",
            Self::FieldIdItem => "FIELD_ID_ITEM",
            Self::MethodIdItem => "METHOD_ID_ITEM",
            Self::ClassDefItem => "CLASS_DEF_ITEM",
            Self::CallSiteIdItem => "CALL_SITE_ID_ITEM",
            Self::MethodHandleItem => "METHOD_HANDLE_ITEM",
            Self::MapList => "MAP_LIST",
            Self::TypeList => "TYPE_LIST",
            Self::AnnotationSetRefList => "ANNOTATION_SET_REF_LIST",
            Self::AnnotationSetItem => "ANNOTATION_SET_ITEM",
            Self::ClassDataItem => "CLASS_DATA_ITEM",
            Self::CodeItem => "CODE_ITEM",
            Self::StringDataItem => "STRING_DATA_ITEM",
            Self::DebugInfoItem => "DEBUG_INFO_ITEM",
            Self::AnnotationItem => "ANNOTATION_ITEM",
            Self::EncodedArrayItem => "ENCODED_ARRAY_ITEM",
            Self::AnnotationsDirectoryItem => "ANNOTATIONS_DIRECTORY_ITEM",
            Self::HiddenapiClassDataItem => "HIDDENAPI_CLASS_DATA_ITEM",
        };
        f.pad(name)
    }
}

impl TryFrom<u16> for MapItemType {
    type Error = DexError;

    fn try_from(v: u16) -> Result<Self, Self::Error> {
        match v {
            0x0000 => Ok(Self::HeaderItem),
            0x0001 => Ok(Self::StringIdItem),
            0x0002 => Ok(Self::TypeIdItem),
            0x0003 => Ok(Self::ProtoIdItem),
            0x0004 => Ok(Self::FieldIdItem),
            0x0005 => Ok(Self::MethodIdItem),
            0x0006 => Ok(Self::ClassDefItem),
            0x0007 => Ok(Self::CallSiteIdItem),
            0x0008 => Ok(Self::MethodHandleItem),
            0x1000 => Ok(Self::MapList),
            0x1001 => Ok(Self::TypeList),
            0x1002 => Ok(Self::AnnotationSetRefList),
            0x1003 => Ok(Self::AnnotationSetItem),
            0x2000 => Ok(Self::ClassDataItem),
            0x2001 => Ok(Self::CodeItem),
            0x2002 => Ok(Self::StringDataItem),
            0x2003 => Ok(Self::DebugInfoItem),
            0x2004 => Ok(Self::AnnotationItem),
            0x2005 => Ok(Self::EncodedArrayItem),
            0x2006 => Ok(Self::AnnotationsDirectoryItem),
            0xF000 => Ok(Self::HiddenapiClassDataItem),
            _ => Err(DexError::Structure(format!("unknown map type: '{v:#06x}'"))),
        }
    }
}
