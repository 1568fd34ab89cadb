use super::{arg, Binding, BindingValue};
use crate::context::PacketContext;

/// `containsLayer(name)`: true if the current packet has a layer of that type
pub struct ContainsLayer;

impl Binding for ContainsLayer {
    fn name(&self) -> &'static str {
        "containsLayer"
    }

    fn arity(&self) -> usize {
        1
    }

    fn invoke(&self, ctx: &PacketContext, args: &[String]) -> Option<BindingValue> {
        Some(BindingValue::Bool(ctx.contains_layer(arg(args, 0))))
    }
}

/// `layerIndex(name)`: index of the first layer of that type
pub struct LayerIndex;

impl Binding for LayerIndex {
    fn name(&self) -> &'static str {
        "layerIndex"
    }

    fn arity(&self) -> usize {
        1
    }

    fn invoke(&self, ctx: &PacketContext, args: &[String]) -> Option<BindingValue> {
        ctx.layer_index(arg(args, 0))
            .map(|i| BindingValue::Int(i as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::tests::arp_context;

    #[test]
    fn layers_of_arp() {
        let ctx = arp_context();
        let arp = vec!["ARP".to_owned()];
        let tcp = vec!["TCP".to_owned()];
        assert_eq!(ContainsLayer.invoke(&ctx, &arp), Some(BindingValue::Bool(true)));
        assert_eq!(ContainsLayer.invoke(&ctx, &tcp), Some(BindingValue::Bool(false)));
        assert_eq!(LayerIndex.invoke(&ctx, &arp), Some(BindingValue::Int(1)));
        assert_eq!(LayerIndex.invoke(&ctx, &tcp), None);
        // missing argument
        assert_eq!(ContainsLayer.invoke(&ctx, &[]), Some(BindingValue::Bool(false)));
        assert_eq!(LayerIndex.invoke(&ctx, &[]), None);
    }

    #[test]
    fn empty_context() {
        let ctx = PacketContext::default();
        let args = vec!["Ethernet".to_owned()];
        assert_eq!(ContainsLayer.invoke(&ctx, &args), Some(BindingValue::Bool(false)));
        assert_eq!(LayerIndex.invoke(&ctx, &args), None);
    }
}
