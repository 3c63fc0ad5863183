use crate::app::App;
use crate::errors::Result;
use crate::msgs::Msg;
use idreg_attribute::Attribute;
use idreg_storage::Context;

impl App {
    /// Route one decoded message to its keeper. Runs on a branch so a failed
    /// message leaves nothing behind.
    pub fn handle(&self, ctx: &Context, msg: &Msg) -> Result<()> {
        ctx.run_atomic(|ctx| self.dispatch(ctx, msg))
    }

    fn dispatch(&self, ctx: &Context, msg: &Msg) -> Result<()> {
        let names = &self.names;
        let attributes = &self.attributes;
        match msg {
            Msg::BindName(m) => names.bind_name(ctx, &m.record, &m.parent, &m.parent.address)?,
            Msg::DeleteName(m) => names.delete_name(ctx, &m.record.name, &m.record.address)?,
            Msg::ModifyName(m) => names.modify_name(
                ctx,
                &m.authority,
                &m.record.name,
                &m.record.address,
                m.record.restricted,
            )?,
            Msg::CreateRootName(m) => names.create_root_name(
                ctx,
                &m.authority,
                &m.record.name,
                &m.record.address,
                m.record.restricted,
            )?,
            Msg::UpdateNameParams(m) => names.update_params(ctx, &m.authority, m.params.clone())?,
            Msg::AddAttribute(m) => {
                let attr = Attribute::new(
                    m.name.clone(),
                    m.account,
                    m.attribute_type,
                    m.value.clone(),
                    m.expiration,
                );
                attributes.set_attribute(ctx, attr, &m.owner)?
            }
            Msg::UpdateAttribute(m) => {
                let original = Attribute::new(
                    m.name.clone(),
                    m.account,
                    m.original_type,
                    m.original_value.clone(),
                    None,
                );
                let update = Attribute::new(
                    m.name.clone(),
                    m.account,
                    m.update_type,
                    m.update_value.clone(),
                    None,
                );
                attributes.update_attribute(ctx, &original, update, &m.owner)?
            }
            Msg::UpdateAttributeExpiration(m) => attributes.update_attribute_expiration(
                ctx,
                &m.name,
                &m.value,
                m.expiration,
                &m.account,
                &m.owner,
            )?,
            Msg::DeleteAttribute(m) => {
                attributes.delete_attribute(ctx, &m.account, &m.name, None, &m.owner)?;
            }
            Msg::DeleteDistinctAttribute(m) => {
                attributes.delete_attribute(ctx, &m.account, &m.name, Some(&m.value), &m.owner)?;
            }
            Msg::SetAccountData(m) => attributes.set_account_data(ctx, &m.account, &m.value)?,
            Msg::UpdateAttributeParams(m) => {
                attributes.update_params(ctx, &m.authority, m.params.clone())?
            }
        }
        Ok(())
    }
}
